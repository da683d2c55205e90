//! Response normalization: coerces shape-ambiguous agent output into a structured value.
//!
//! Agents may hand back an already-structured JSON value, JSON encoded as text,
//! free text, or a bare scalar. Everything downstream expects something it can
//! index by key, so every input maps to exactly one structured result here and
//! nothing in this module can fail.

use serde_json::{Map, Value};
use tracing::warn;

pub mod handlers;

/// Key used to carry text that could not be decoded as JSON.
pub const RAW_RESPONSE_KEY: &str = "raw_response";

/// Number of characters of undecodable text included in the warning log.
const LOG_PREVIEW_CHARS: usize = 100;

/// The as-received output of an agent call.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    /// A JSON object or array.
    Structured(Value),
    /// Text that may or may not be encoded JSON.
    Text(String),
    /// A number, boolean or null.
    Other(Value),
}

impl Default for RawResponse {
    fn default() -> Self {
        RawResponse::Other(Value::Null)
    }
}

impl From<Value> for RawResponse {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => RawResponse::Structured(value),
            Value::String(text) => RawResponse::Text(text),
            other => RawResponse::Other(other),
        }
    }
}

impl From<String> for RawResponse {
    fn from(text: String) -> Self {
        RawResponse::Text(text)
    }
}

impl From<&str> for RawResponse {
    fn from(text: &str) -> Self {
        RawResponse::Text(text.to_string())
    }
}

impl<T: Into<RawResponse>> From<Option<T>> for RawResponse {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Normalizes a raw agent response.
///
/// - objects and arrays are returned unchanged
/// - text is decoded as JSON; undecodable text becomes `{"raw_response": text}`
/// - scalars and null yield `default`, or `{}` when no default is given
///
/// Only the top level is inspected. Text nested deeper than serde_json's
/// recursion limit (128 levels) does not decode and is kept as raw text.
pub fn normalize_response(raw: impl Into<RawResponse>, default: Option<Value>) -> Value {
    match raw.into() {
        RawResponse::Structured(value) => value,
        RawResponse::Text(text) => match serde_json::from_str::<Value>(&text) {
            Ok(decoded) => decoded,
            Err(e) => {
                let preview: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
                warn!("Failed to decode agent response as JSON ({e}), keeping raw text: {preview}");
                wrap_raw(Value::String(text))
            }
        },
        RawResponse::Other(_) => default.unwrap_or_else(empty_object),
    }
}

/// Encodes a value as JSON text.
///
/// A string that already holds valid JSON is re-encoded canonically instead of
/// being quoted a second time.
pub fn encode_payload(value: &Value) -> String {
    if let Value::String(text) = value {
        if let Ok(decoded) = serde_json::from_str::<Value>(text) {
            return decoded.to_string();
        }
    }
    value.to_string()
}

/// Normalizes `raw` and returns `key` from the resulting object.
/// Falls back to `default`, or `{}`, when the key is missing or the result is not an object.
pub fn extract_field(raw: impl Into<RawResponse>, key: &str, default: Option<Value>) -> Value {
    normalize_response(raw, None)
        .as_object()
        .and_then(|map| map.get(key))
        .cloned()
        .or(default)
        .unwrap_or_else(empty_object)
}

/// Wraps a value under the `raw_response` key.
pub fn wrap_raw(value: Value) -> Value {
    let mut map = Map::new();
    map.insert(RAW_RESPONSE_KEY.to_string(), value);
    Value::Object(map)
}

pub fn empty_object() -> Value {
    Value::Object(Map::new())
}
