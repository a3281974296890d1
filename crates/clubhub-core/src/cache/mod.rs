//! Session-scoped caching of fetched collections.
//!
//! This module provides the `SessionCache`, an in-memory store living as
//! long as its sync context (the browser tab in the web client). It holds
//! collections such as "your clubs", "other clubs" and "pending clubs" so
//! back-navigation does not refetch them.
//!
//! Entries have no TTL. They are removed explicitly by mutations, and each
//! removal bumps a per-key epoch so a fetch that started earlier cannot
//! write its outdated payload back.

pub mod session;

pub use session::{CacheKey, CachedData, Epoch, SessionCache};
