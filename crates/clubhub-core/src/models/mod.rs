//! Data models for club management entities.
//!
//! This module contains the records returned by the backend's list and
//! detail endpoints:
//!
//! - `Club`, `ClubCategory`: the club directory, grouped by category
//! - `Membership`, `MemberRole`, `MembershipStatus`: a user's relation to a club
//! - `User`, `UserRole`: account and global role
//! - `ClubEvent`, `AttendanceRecord`: events and their roster
//! - `Task`, `Announcement`: officer tooling
//! - `AdminMetrics`: admin dashboard counters

pub mod admin;
pub mod announcement;
pub mod attendance;
pub mod club;
pub mod event;
pub mod membership;
pub mod task;
pub mod user;

pub use admin::AdminMetrics;
pub use announcement::Announcement;
pub use attendance::{AttendanceRecord, AttendanceStatus};
pub use club::{Club, ClubCategory};
pub use event::{ClubEvent, EventDraft};
pub use membership::{MemberRole, Membership, MembershipStatus};
pub use task::{Task, TaskDraft, TaskStatus};
pub use user::{User, UserRole};
