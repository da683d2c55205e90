pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::agent::handlers;
use crate::normalize::handlers::handle_normalize;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/config/status", get(health::config_status_handler))
        .route("/api/v1/json/normalize", post(handle_normalize))
        // Agent API
        .route("/api/v1/agents/:name/run", post(handlers::handle_run_agent))
        .route(
            "/api/v1/agents/:name/messages",
            get(handlers::handle_agent_messages),
        )
        .route(
            "/api/v1/messages",
            post(handlers::handle_post_message).delete(handlers::handle_clear_messages),
        )
        .route(
            "/api/v1/messages/:receiver",
            get(handlers::handle_messages_for),
        )
        .route(
            "/api/v1/resumes/analyze",
            post(handlers::handle_analyze_resume).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}
