//! HTTP client for the club management REST API.
//!
//! `ApiClient` is the production [`Backend`]: it attaches the bearer
//! credential and JSON accept header to every request and maps failures to
//! [`ApiError`]. It holds no credential of its own; callers pass the current
//! one from the token store on every call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use super::backend::{Backend, Method};
use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the club backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url` (e.g. `https://clubs.example.edu/api`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let builder = builder.header(header::ACCEPT, "application/json");
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Decode a response body, treating an empty body (204, bare 200) as null.
    async fn read_json(response: reqwest::Response, url: &str) -> Result<Value, ApiError> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e)))
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn get_json(&self, path: &str, token: Option<&str>) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");

        let response = Self::authorize(self.client.get(&url), token).send().await?;
        let response = Self::check_response(response).await?;
        Self::read_json(response, &url).await
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!(url = %url, method = %method, "write");

        let builder = match method {
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = Self::authorize(builder, token).send().await?;
        let response = Self::check_response(response).await?;
        Self::read_json(response, &url).await
    }
}
