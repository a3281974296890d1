//! REST API access for the club management backend.
//!
//! This module provides the [`Backend`] trait the sync layer talks to,
//! the reqwest-based [`ApiClient`] implementing it, the [`ApiError`]
//! taxonomy, and normalization of the backend's inconsistent list shapes.
//!
//! Authenticated requests carry `Authorization: Bearer <credential>` and
//! `Accept: application/json`.

pub mod backend;
pub mod client;
pub mod error;
pub mod normalize;

pub use backend::{Backend, Method};
pub use client::ApiClient;
pub use error::{ApiError, GENERIC_FAILURE_MESSAGE};
pub use normalize::{decode_list, extract_list, split_named_lists, ListShape};
