//! Writes followed by cache reconciliation.
//!
//! A successful mutation invalidates the cache keys it affects, reloads the
//! mounted views bound to those keys, publishes its refresh topics and raises
//! a success notification, in that order. A failed mutation leaves the cache
//! untouched and raises an error notification.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::{ApiError, Method};
use crate::cache::CacheKey;
use crate::events::{RefreshBus, Topic};
use crate::models::{AttendanceStatus, EventDraft, MemberRole, MembershipStatus, TaskDraft, TaskStatus};
use crate::notify::NotificationRelay;

use super::fetcher::CollectionFetcher;
use super::view::ViewRegistry;

/// A user action that writes to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Join { club: i64 },
    Cancel { club: i64 },
    Leave { club: i64 },
    UpdateStatus { club: i64, user: i64, status: MembershipStatus },
    UpdateRole { club: i64, user: i64, role: MemberRole, officer_title: Option<String> },
    RemoveMember { club: i64, user: i64 },
    CreateEvent { club: i64, draft: EventDraft },
    DeleteEvent { club: i64, event: i64 },
    CreateTask { club: i64, draft: TaskDraft },
    UpdateTaskStatus { club: i64, task: i64, status: TaskStatus },
    MarkAttendance { event: i64, user: i64, status: AttendanceStatus },
    PostAnnouncement { club: i64, title: String, body: String },
}

/// Everything the mutator needs to carry out one mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationPlan {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub affected: Vec<CacheKey>,
    pub topics: Vec<Topic>,
    pub success_title: String,
    pub success_body: String,
    pub failure_title: String,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Join { .. } => "join",
            Mutation::Cancel { .. } => "cancel",
            Mutation::Leave { .. } => "leave",
            Mutation::UpdateStatus { .. } => "updateStatus",
            Mutation::UpdateRole { .. } => "updateRole",
            Mutation::RemoveMember { .. } => "removeMember",
            Mutation::CreateEvent { .. } => "createEvent",
            Mutation::DeleteEvent { .. } => "deleteEvent",
            Mutation::CreateTask { .. } => "createTask",
            Mutation::UpdateTaskStatus { .. } => "updateTaskStatus",
            Mutation::MarkAttendance { .. } => "markAttendance",
            Mutation::PostAnnouncement { .. } => "postAnnouncement",
        }
    }

    pub fn plan(&self) -> MutationPlan {
        let membership_keys = || {
            vec![
                CacheKey::your_clubs(),
                CacheKey::other_clubs(),
                CacheKey::pending_clubs(),
            ]
        };

        let (method, path, body, affected, topics, title, body_text) = match self {
            Mutation::Join { club } => (
                Method::Post,
                format!("clubs/{}/join", club),
                None,
                membership_keys(),
                vec![Topic::ClubsUpdated, Topic::PendingClubsUpdated],
                "Request Sent",
                "Your request to join has been sent to the club officers.",
            ),
            Mutation::Cancel { club } => (
                Method::Delete,
                format!("clubs/{}/join", club),
                None,
                membership_keys(),
                vec![Topic::ClubsUpdated, Topic::PendingClubsUpdated],
                "Request Cancelled",
                "Your join request was withdrawn.",
            ),
            Mutation::Leave { club } => {
                let mut keys = membership_keys();
                keys.push(CacheKey::club_members(*club));
                (
                    Method::Delete,
                    format!("clubs/{}/membership", club),
                    None,
                    keys,
                    vec![Topic::ClubsUpdated, Topic::MembersUpdated],
                    "Left Club",
                    "You are no longer a member of this club.",
                )
            }
            Mutation::UpdateStatus { club, user, status } => (
                Method::Patch,
                format!("clubs/{}/members/{}/status", club, user),
                Some(json!({ "status": status.as_str() })),
                vec![CacheKey::club_requests(*club), CacheKey::club_members(*club)],
                vec![Topic::PendingClubsUpdated, Topic::MembersUpdated],
                match status {
                    MembershipStatus::Approved => "Request Approved",
                    MembershipStatus::Rejected => "Request Rejected",
                    MembershipStatus::Pending => "Request Updated",
                },
                match status {
                    MembershipStatus::Approved => "The applicant is now a member.",
                    MembershipStatus::Rejected => "The applicant has been notified.",
                    MembershipStatus::Pending => "The request was moved back to pending.",
                },
            ),
            Mutation::UpdateRole { club, user, role, officer_title } => (
                Method::Patch,
                format!("clubs/{}/members/{}/role", club, user),
                Some(json!({ "role": role, "officer_title": officer_title })),
                vec![CacheKey::club_members(*club)],
                vec![Topic::MembersUpdated],
                "Role Updated",
                "The member's role was changed.",
            ),
            Mutation::RemoveMember { club, user } => (
                Method::Delete,
                format!("clubs/{}/members/{}", club, user),
                None,
                vec![CacheKey::club_members(*club)],
                vec![Topic::MembersUpdated],
                "Member Removed",
                "The member was removed from the club.",
            ),
            Mutation::CreateEvent { club, draft } => (
                Method::Post,
                format!("clubs/{}/events", club),
                Some(json!(draft)),
                vec![CacheKey::club_events(*club)],
                vec![Topic::EventsUpdated],
                "Event Created",
                "The event was added to the calendar.",
            ),
            Mutation::DeleteEvent { club, event } => (
                Method::Delete,
                format!("events/{}", event),
                None,
                vec![CacheKey::club_events(*club), CacheKey::event_attendance(*event)],
                vec![Topic::EventsUpdated, Topic::AttendanceUpdated],
                "Event Deleted",
                "The event was removed.",
            ),
            Mutation::CreateTask { club, draft } => (
                Method::Post,
                format!("clubs/{}/tasks", club),
                Some(json!(draft)),
                vec![CacheKey::club_tasks(*club)],
                vec![Topic::TasksUpdated],
                "Task Created",
                "The task was assigned.",
            ),
            Mutation::UpdateTaskStatus { club, task, status } => (
                Method::Patch,
                format!("tasks/{}", task),
                Some(json!({ "status": status })),
                vec![CacheKey::club_tasks(*club)],
                vec![Topic::TasksUpdated],
                "Task Updated",
                "The task status was changed.",
            ),
            Mutation::MarkAttendance { event, user, status } => (
                Method::Post,
                format!("events/{}/attendance", event),
                Some(json!({ "user_id": user, "status": status })),
                vec![CacheKey::event_attendance(*event)],
                vec![Topic::AttendanceUpdated],
                "Attendance Saved",
                "The attendance record was updated.",
            ),
            Mutation::PostAnnouncement { club, title, body } => (
                Method::Post,
                format!("clubs/{}/announcements", club),
                Some(json!({ "title": title, "body": body })),
                vec![CacheKey::club_announcements(*club)],
                vec![Topic::AnnouncementsUpdated],
                "Announcement Posted",
                "Members can now see your announcement.",
            ),
        };

        MutationPlan {
            method,
            path,
            body,
            affected,
            topics,
            success_title: title.to_string(),
            success_body: body_text.to_string(),
            failure_title: format!("Could not {}", self.verb()),
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Mutation::Join { .. } => "send join request",
            Mutation::Cancel { .. } => "cancel request",
            Mutation::Leave { .. } => "leave club",
            Mutation::UpdateStatus { .. } => "update request",
            Mutation::UpdateRole { .. } => "update role",
            Mutation::RemoveMember { .. } => "remove member",
            Mutation::CreateEvent { .. } => "create event",
            Mutation::DeleteEvent { .. } => "delete event",
            Mutation::CreateTask { .. } => "create task",
            Mutation::UpdateTaskStatus { .. } => "update task",
            Mutation::MarkAttendance { .. } => "save attendance",
            Mutation::PostAnnouncement { .. } => "post announcement",
        }
    }
}

#[derive(Clone)]
pub struct Mutator {
    fetcher: CollectionFetcher,
    views: Arc<ViewRegistry>,
    bus: Arc<RefreshBus>,
    relay: NotificationRelay,
}

impl Mutator {
    pub fn new(
        fetcher: CollectionFetcher,
        views: Arc<ViewRegistry>,
        bus: Arc<RefreshBus>,
        relay: NotificationRelay,
    ) -> Self {
        Self {
            fetcher,
            views,
            bus,
            relay,
        }
    }

    /// Perform `mutation` and reconcile caches. Errors are also surfaced as
    /// an error notification, so callers only need the result for form state.
    pub async fn mutate(&self, mutation: &Mutation) -> Result<Value, ApiError> {
        let plan = mutation.plan();

        let credential = match self.fetcher.credential() {
            Ok(credential) => credential,
            Err(e) => {
                self.relay.error(&plan.failure_title, e.user_message());
                return Err(e);
            }
        };

        let response = self
            .fetcher
            .backend()
            .send_json(plan.method, &plan.path, Some(credential.as_str()), plan.body.as_ref())
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.fetcher.note_failure(&e);
                warn!(mutation = mutation.name(), path = %plan.path, error = %e, "Mutation failed");
                self.relay.error(&plan.failure_title, e.user_message());
                return Err(e);
            }
        };

        // Invalidate before any reload can read the cache.
        self.fetcher.cache().invalidate_all(&plan.affected);

        let mounted = self.views.mounted_for(&plan.affected);
        let reloads = mounted.iter().map(|view| view.refresh(&self.fetcher));
        for (view, result) in mounted.iter().zip(join_all(reloads).await) {
            if let Err(e) = result {
                warn!(cache = %view.key(), error = %e, "Reload after mutation failed");
            }
        }

        for topic in &plan.topics {
            self.bus.publish(*topic);
        }

        let body = response
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(plan.success_body);
        self.relay.success(&plan.success_title, body);
        info!(mutation = mutation.name(), path = %plan.path, reloaded = mounted.len(), "Mutation applied");

        Ok(response)
    }
}
