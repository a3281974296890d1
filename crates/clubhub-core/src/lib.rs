//! ClubHub core - session and membership state sync for a student club service.
//!
//! This crate holds everything a front end needs to talk to the club backend:
//! the HTTP client and its error model, the stored credential and auth flows,
//! the per-session collection cache, and the fetch/mutate machinery that keeps
//! mounted views consistent after writes. Front ends (the CLI, or any UI) only
//! render what `SyncContext` hands them.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod cooldown;
pub mod events;
pub mod models;
pub mod notify;
pub mod sync;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, Backend};
pub use auth::{Access, AuthFlows, Requirement, TokenStore};
pub use cache::{CacheKey, SessionCache};
pub use config::Config;
pub use events::{RefreshBus, Topic};
pub use notify::{Notification, NotificationKind, NotificationRelay};
pub use sync::{CollectionView, FetchOutcome, Mutation, SyncContext, SyncSettings};
