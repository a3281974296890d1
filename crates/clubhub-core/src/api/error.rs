use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

/// Message shown for failures that carry nothing useful for the user
/// (transport errors, 5xx, unparseable bodies).
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not signed in - no credential available")]
    MissingCredential,

    #[error("Unauthorized - session may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Please wait {0}s before trying again")]
    CooldownActive(u32),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shape returned by the backend for failed writes.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, FieldMessages>,
}

/// Field errors arrive either as a list of messages or a single string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldMessages {
    Many(Vec<String>),
    One(String),
}

impl FieldMessages {
    fn into_vec(self) -> Vec<String> {
        match self {
            FieldMessages::Many(v) => v,
            FieldMessages::One(s) => vec![s],
        }
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..end],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed.message.or(parsed.error);
        let detail = message
            .clone()
            .unwrap_or_else(|| Self::truncate_body(body));

        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(detail),
            404 => ApiError::NotFound(detail),
            422 => ApiError::Validation {
                message: message.unwrap_or_else(|| "The given data was invalid.".to_string()),
                errors: parsed
                    .errors
                    .into_iter()
                    .map(|(field, msgs)| (field, msgs.into_vec()))
                    .collect(),
            },
            429 => ApiError::RateLimited,
            code @ 500..=599 => ApiError::ServerError {
                status: code,
                body: Self::truncate_body(body),
            },
            code @ 400..=499 => match message {
                Some(message) => ApiError::Rejected {
                    status: code,
                    message,
                },
                None => ApiError::UnexpectedStatus {
                    status: code,
                    body: detail,
                },
            },
            code => ApiError::UnexpectedStatus {
                status: code,
                body: detail,
            },
        }
    }

    /// HTTP status the failure was derived from, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::AccessDenied(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Validation { .. } => Some(422),
            ApiError::Rejected { status, .. }
            | ApiError::ServerError { status, .. }
            | ApiError::UnexpectedStatus { status, .. } => Some(*status),
            ApiError::RateLimited => Some(429),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for failures decided locally, before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ApiError::MissingCredential | ApiError::CooldownActive(_)
        )
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::MissingCredential | ApiError::Unauthorized)
    }

    /// Field errors of a 422 response, empty for everything else.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            ApiError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Text suitable for a notification body.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::AccessDenied(msg) | ApiError::NotFound(msg) => msg.clone(),
            ApiError::MissingCredential | ApiError::Unauthorized => {
                "Please sign in to continue.".to_string()
            }
            ApiError::CooldownActive(_) | ApiError::RateLimited => self.to_string(),
            ApiError::ServerError { .. }
            | ApiError::UnexpectedStatus { .. }
            | ApiError::NetworkError(_)
            | ApiError::InvalidResponse(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}
