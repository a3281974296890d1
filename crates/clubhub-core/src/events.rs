//! Cross-view refresh signals.
//!
//! A topic is a named broadcast with no payload: listeners refetch their own
//! data when it fires. Delivery is best-effort to whoever is subscribed at
//! publish time; a receiver that falls behind sees `Lagged` and should simply
//! refresh once.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

/// Buffer per topic. Signals carry no data, so a small buffer is plenty.
const TOPIC_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ClubsUpdated,
    PendingClubsUpdated,
    MembersUpdated,
    EventsUpdated,
    TasksUpdated,
    AttendanceUpdated,
    AnnouncementsUpdated,
}

impl Topic {
    pub fn name(&self) -> &'static str {
        match self {
            Topic::ClubsUpdated => "clubs-updated",
            Topic::PendingClubsUpdated => "pending-clubs-updated",
            Topic::MembersUpdated => "members-updated",
            Topic::EventsUpdated => "events-updated",
            Topic::TasksUpdated => "tasks-updated",
            Topic::AttendanceUpdated => "attendance-updated",
            Topic::AnnouncementsUpdated => "announcements-updated",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Default)]
pub struct RefreshBus {
    topics: Mutex<HashMap<Topic, broadcast::Sender<()>>>,
}

impl RefreshBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: Topic) -> broadcast::Sender<()> {
        self.topics
            .lock()
            .entry(topic)
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<()> {
        self.sender(topic).subscribe()
    }

    /// Signal `topic`. Returns how many listeners were reached.
    pub fn publish(&self, topic: Topic) -> usize {
        let reached = self.sender(topic).send(()).unwrap_or(0);
        trace!(topic = %topic, reached, "Published refresh signal");
        reached
    }
}
