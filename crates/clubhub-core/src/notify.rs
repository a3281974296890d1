//! Transient user-facing messages raised after mutations.
//!
//! Each notification follows `Created -> Visible -> (Dismissed | Expired)
//! -> Removed` and never goes back. Visible notifications stack in arrival
//! order; each is removed after the relay's TTL unless dismissed first.
//! Nothing survives a restart.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// How long a notification stays up without being dismissed.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(4);

/// Buffer for removal events; front ends that lag just re-read `visible()`.
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NotificationId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Visible,
    Dismissed,
    Expired,
    Removed,
}

impl Phase {
    pub fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Created, Phase::Visible)
                | (Phase::Visible, Phase::Dismissed)
                | (Phase::Visible, Phase::Expired)
                | (Phase::Dismissed, Phase::Removed)
                | (Phase::Expired, Phase::Removed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Dismissed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEvent {
    Shown(NotificationId),
    Removed {
        id: NotificationId,
        reason: RemovalReason,
    },
}

struct Entry {
    notification: Notification,
    phase: Phase,
    expires_at: Instant,
    timer: Option<JoinHandle<()>>,
}

impl Entry {
    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal notification transition {:?} -> {:?}",
            self.phase,
            next
        );
        self.phase = next;
    }
}

#[derive(Default)]
struct RelayState {
    next_id: u64,
    entries: Vec<Entry>,
}

impl RelayState {
    /// Take a visible entry out of the stack. `None` if it is already gone.
    fn remove(&mut self, id: NotificationId, reason: RemovalReason) -> Option<Entry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.notification.id == id && e.phase == Phase::Visible)?;
        let mut entry = self.entries.remove(pos);
        entry.advance(match reason {
            RemovalReason::Dismissed => Phase::Dismissed,
            RemovalReason::Expired => Phase::Expired,
        });
        entry.advance(Phase::Removed);
        Some(entry)
    }
}

#[derive(Clone)]
pub struct NotificationRelay {
    state: Arc<Mutex<RelayState>>,
    events: broadcast::Sender<RelayEvent>,
    ttl: Duration,
}

impl Default for NotificationRelay {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}

impl NotificationRelay {
    pub fn new(ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(RelayState::default())),
            events,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn notify(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> NotificationId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = NotificationId(state.next_id);

        let mut entry = Entry {
            notification: Notification {
                id,
                kind,
                title: title.into(),
                body: body.into(),
                created_at: Utc::now(),
            },
            phase: Phase::Created,
            expires_at: Instant::now() + self.ttl,
            timer: None,
        };
        debug!(id = id.0, kind = ?kind, title = %entry.notification.title, "Notification raised");

        // Without a runtime the entry still expires, lazily, on the next read.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let relay = self.clone();
            let ttl = self.ttl;
            entry.timer = Some(handle.spawn(async move {
                tokio::time::sleep(ttl).await;
                relay.finish(id, RemovalReason::Expired);
            }));
        }

        entry.advance(Phase::Visible);
        state.entries.push(entry);
        drop(state);

        let _ = self.events.send(RelayEvent::Shown(id));
        id
    }

    pub fn success(&self, title: impl Into<String>, body: impl Into<String>) -> NotificationId {
        self.notify(NotificationKind::Success, title, body)
    }

    pub fn error(&self, title: impl Into<String>, body: impl Into<String>) -> NotificationId {
        self.notify(NotificationKind::Error, title, body)
    }

    /// Remove a notification before it expires. Returns `true` only for the
    /// call that actually removed it.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        self.finish(id, RemovalReason::Dismissed)
    }

    fn finish(&self, id: NotificationId, reason: RemovalReason) -> bool {
        let removed = self.state.lock().remove(id, reason);
        match removed {
            Some(entry) => {
                if reason == RemovalReason::Dismissed {
                    if let Some(timer) = entry.timer {
                        timer.abort();
                    }
                }
                let _ = self.events.send(RelayEvent::Removed { id, reason });
                true
            }
            None => false,
        }
    }

    fn sweep_expired(&self) {
        let now = Instant::now();
        let expired: Vec<NotificationId> = self
            .state
            .lock()
            .entries
            .iter()
            .filter(|e| e.expires_at <= now)
            .map(|e| e.notification.id)
            .collect();
        for id in expired {
            self.finish(id, RemovalReason::Expired);
        }
    }

    /// Notifications currently shown, oldest first.
    pub fn visible(&self) -> Vec<Notification> {
        self.sweep_expired();
        self.state
            .lock()
            .entries
            .iter()
            .map(|e| e.notification.clone())
            .collect()
    }

    pub fn is_visible(&self, id: NotificationId) -> bool {
        self.visible().iter().any(|n| n.id == id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }
}
