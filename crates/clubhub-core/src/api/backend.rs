//! The seam between the sync layer and the REST backend.
//!
//! Everything above this module (fetcher, mutator, auth flows) only speaks
//! JSON values and relative paths, so the reqwest client can be swapped for
//! an in-memory backend in tests.

use async_trait::async_trait;
use serde_json::Value;

use super::ApiError;

/// HTTP verbs used for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON-over-HTTP backend.
///
/// `token` is attached as a bearer credential when present. Implementations
/// map non-2xx responses to [`ApiError::from_status`] and never retry.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Issue a GET and return the decoded body.
    async fn get_json(&self, path: &str, token: Option<&str>) -> Result<Value, ApiError>;

    /// Issue a write and return the decoded body (`Value::Null` for empty bodies).
    async fn send_json(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value, ApiError>;
}
