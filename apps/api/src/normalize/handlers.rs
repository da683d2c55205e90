use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::{extract_field, normalize_response};

#[derive(Debug, Deserialize)]
pub struct NormalizeRequest {
    #[serde(default)]
    pub data: Value,
    pub default: Option<Value>,
    /// When set, only this key of the normalized object is returned.
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub result: Value,
}

/// POST /api/v1/json/normalize
///
/// Runs an arbitrary payload through the response normalizer. Handy for checking
/// how a given agent output will be interpreted.
pub async fn handle_normalize(Json(req): Json<NormalizeRequest>) -> Json<NormalizeResponse> {
    let result = match req.key {
        Some(key) => extract_field(req.data, &key, req.default),
        None => normalize_response(req.data, req.default),
    };
    Json(NormalizeResponse { result })
}
