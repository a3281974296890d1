//! Keeping mounted views in step with the backend.
//!
//! This module wires the pieces of a session together:
//!
//! - `view`: per-view state and supersession of in-flight fetches
//! - `fetcher`: authenticated GETs, normalization and cache commits
//! - `mutator`: writes followed by invalidation, reload, topics and a notification
//! - `context`: one `SyncContext` owning all of the above

pub mod context;
pub mod fetcher;
pub mod mutator;
pub mod view;

pub use context::{SyncContext, SyncSettings};
pub use fetcher::{CollectionFetcher, FetchOutcome};
pub use mutator::{Mutation, MutationPlan, Mutator};
pub use view::{CollectionView, FetchTicket, Refresh, ViewRegistry};
