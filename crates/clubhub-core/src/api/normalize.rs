//! Normalization of list responses.
//!
//! The backend is inconsistent about list shapes: some endpoints return a
//! bare array, some wrap it in `{ "data": [...] }`, some use a named field
//! (`{ "clubs": [...] }`), and the club directory groups clubs by category
//! (`{ "academics": [...], "sports": [...] }`). Rules are tried in order.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ApiError;

/// Where a list lives inside a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListShape {
    /// Bare array or `{ "data": [...] }`.
    Plain,
    /// Like `Plain`, but also accepts `{ "<field>": [...] }` and
    /// `{ "data": { "<field>": [...] } }`.
    Field(&'static str),
}

/// Extract the array from a list response.
pub fn extract_list(value: Value, shape: &ListShape) -> Result<Vec<Value>, ApiError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.get("data") {
                return Ok(items.clone());
            }
            if let ListShape::Field(field) = shape {
                if let Some(Value::Array(items)) = map.remove(*field) {
                    return Ok(items);
                }
                if let Some(Value::Object(mut data)) = map.remove("data") {
                    if let Some(Value::Array(items)) = data.remove(*field) {
                        return Ok(items);
                    }
                }
            }
            Err(ApiError::InvalidResponse(format!(
                "expected a list ({:?}), got an object without one",
                shape
            )))
        }
        other => Err(ApiError::InvalidResponse(format!(
            "expected a list, got {}",
            type_name(&other)
        ))),
    }
}

/// Extract and decode a typed list.
pub fn decode_list<T: DeserializeOwned>(value: Value, shape: &ListShape) -> Result<Vec<T>, ApiError> {
    extract_list(value, shape)?
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| ApiError::InvalidResponse(format!("Failed to decode list item: {}", e)))
        })
        .collect()
}

/// Split an object of named sub-arrays into `(name, items)` pairs.
///
/// Non-array fields are skipped, a `data` wrapper (object or array) is
/// unwrapped, and a bare array comes back as a single unnamed group.
pub fn split_named_lists(value: Value) -> Result<Vec<(String, Vec<Value>)>, ApiError> {
    match value {
        Value::Array(items) => Ok(vec![(String::new(), items)]),
        Value::Object(mut map) => {
            match map.get("data") {
                Some(Value::Array(_)) | Some(Value::Object(_)) => {
                    if let Some(data) = map.remove("data") {
                        return split_named_lists(data);
                    }
                }
                _ => {}
            }
            Ok(map
                .into_iter()
                .filter_map(|(name, v)| match v {
                    Value::Array(items) => Some((name, items)),
                    _ => None,
                })
                .collect())
        }
        other => Err(ApiError::InvalidResponse(format!(
            "expected grouped lists, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
