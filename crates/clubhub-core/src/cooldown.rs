//! Countdown used to throttle resend-verification and password-reset requests.
//!
//! States: `Idle -> Counting(n) -> ... -> Counting(1) -> Idle`. One tick
//! decrements the count; cancelling or dropping the cooldown stops the tick
//! and returns to `Idle`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const DEFAULT_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Idle,
    Counting(u32),
}

pub struct Cooldown {
    remaining: Arc<watch::Sender<u32>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    tick: Duration,
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new()
    }
}

impl Cooldown {
    pub fn new() -> Self {
        Self::with_tick(DEFAULT_TICK)
    }

    pub fn with_tick(tick: Duration) -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            remaining: Arc::new(tx),
            ticker: Mutex::new(None),
            tick,
        }
    }

    /// Start (or restart) counting down from `ticks`. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, ticks: u32) {
        self.cancel();
        if ticks == 0 {
            return;
        }
        self.remaining.send_replace(ticks);
        self.spawn_ticker();
    }

    /// Start counting only if idle. The check and the start are one step,
    /// so of two concurrent callers exactly one gets `Ok`. `Err` carries
    /// the seconds left.
    pub fn try_start(&self, ticks: u32) -> Result<(), u32> {
        if ticks == 0 {
            return Ok(());
        }
        let mut left_over = 0;
        let claimed = self.remaining.send_if_modified(|left| {
            if *left == 0 {
                *left = ticks;
                true
            } else {
                left_over = *left;
                false
            }
        });
        if !claimed {
            return Err(left_over);
        }
        self.spawn_ticker();
        Ok(())
    }

    fn spawn_ticker(&self) {
        let remaining = Arc::clone(&self.remaining);
        let tick = self.tick;
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let mut finished = false;
                remaining.send_modify(|left| {
                    *left = left.saturating_sub(1);
                    finished = *left == 0;
                });
                if finished {
                    break;
                }
            }
        });
        if let Some(previous) = self.ticker.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop counting and return to idle.
    pub fn cancel(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
        self.remaining.send_replace(0);
    }

    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    pub fn state(&self) -> CooldownState {
        match self.remaining() {
            0 => CooldownState::Idle,
            n => CooldownState::Counting(n),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == CooldownState::Idle
    }

    /// Watch the remaining count, e.g. to render "Resend in 42s".
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.remaining.subscribe()
    }
}

impl Drop for Cooldown {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.abort();
        }
    }
}
