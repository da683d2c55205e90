use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::config::ConfigStatus;
use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "jobsniper-api"
    }))
}

/// GET /api/v1/config/status
/// Reports configuration problems and which features are enabled.
pub async fn config_status_handler(State(state): State<AppState>) -> Json<ConfigStatus> {
    Json(state.config.validate())
}
