//! Axum route handlers for the Agent API.

use anyhow::Context;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::agent::outcome::AgentOutcome;
use crate::agent::registry::CONTROLLER_AGENT;
use crate::agent::safe_call::run_agent;
use crate::errors::AppError;
use crate::pdf::{extract_text_from_pdf, read_pdf_info, PdfInfo};
use crate::protocol::{AgentMessage, MessageType};
use crate::state::AppState;

/// Bus identity of the HTTP API.
pub const API_SENDER: &str = "api";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RunAgentRequest {
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResumeResponse {
    pub filename: String,
    pub text_chars: usize,
    pub pdf: PdfInfo,
    #[serde(flatten)]
    pub outcome: AgentOutcome,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/agents/:name/run
///
/// Always 200 for a known agent; agent failures come back as `success: false`.
pub async fn handle_run_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<RunAgentRequest>,
) -> Result<Json<AgentOutcome>, AppError> {
    let outcome = dispatch(&state, &name, request.input).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/resumes/analyze
///
/// Multipart upload with a `file` PDF field. The extracted text is sent to the
/// controller agent.
pub async fn handle_analyze_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResumeResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error("Invalid multipart body", e))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("resume.pdf").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| upload_error("Failed to read upload", e))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) =
        upload.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::Validation(format!(
            "Only PDF uploads are supported, got '{filename}'"
        )));
    }

    let file = tempfile::Builder::new()
        .prefix("resume-")
        .suffix(".pdf")
        .tempfile()
        .context("Failed to create temp file for upload")?;
    tokio::fs::write(file.path(), &bytes)
        .await
        .context("Failed to write upload to temp file")?;

    let resume_text = extract_text_from_pdf(file.path()).await?;
    let text_chars = resume_text.chars().count();
    let pdf = read_pdf_info(file.path()).await?;

    let payload = json!({
        "resume_text": resume_text,
        "filename": filename,
    });
    let outcome = dispatch(&state, CONTROLLER_AGENT, payload).await?;

    Ok(Json(AnalyzeResumeResponse {
        filename,
        text_chars,
        pdf,
        outcome,
    }))
}

/// GET /api/v1/agents/:name/messages
pub async fn handle_agent_messages(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<AgentMessage>>, AppError> {
    let agent = state.agents.get(&name).ok_or_else(|| unknown_agent(&state, &name))?;
    Ok(Json(state.bus.conversation(API_SENDER, agent.name())))
}

/// POST /api/v1/messages
///
/// Accepts a raw message body, decoded leniently, and publishes it on the bus.
pub async fn handle_post_message(State(state): State<AppState>, body: String) -> Json<AgentMessage> {
    let message = AgentMessage::from_json(&body);
    state.bus.send(message.clone());
    Json(message)
}

/// GET /api/v1/messages/:receiver
pub async fn handle_messages_for(
    State(state): State<AppState>,
    Path(receiver): Path<String>,
) -> Json<Vec<AgentMessage>> {
    Json(state.bus.messages_for(&receiver))
}

/// DELETE /api/v1/messages
///
/// Drops the bus history. Subscriptions stay in place.
pub async fn handle_clear_messages(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.bus.clear();
    Json(json!({ "cleared": cleared }))
}

/// Runs a registered agent and records the exchange on the bus.
async fn dispatch(state: &AppState, key: &str, payload: Value) -> Result<AgentOutcome, AppError> {
    let agent = state.agents.get(key).ok_or_else(|| unknown_agent(state, key))?;

    state.bus.send(
        AgentMessage::new(API_SENDER, agent.name(), payload.clone(), MessageType::Request)
            .with_metadata("agent_key", json!(key)),
    );

    let outcome = run_agent(agent.as_ref(), &payload).await;
    debug!(
        "{} outcome: success={} score={}",
        agent.name(),
        outcome.success,
        outcome.score()
    );

    let reply_type = if outcome.success {
        MessageType::Response
    } else {
        MessageType::Error
    };
    state.bus.send(
        AgentMessage::new(
            agent.name(),
            API_SENDER,
            serde_json::to_value(&outcome).unwrap_or_default(),
            reply_type,
        )
        .with_metadata("agent_key", json!(key)),
    );

    Ok(outcome)
}

/// Body-limit overflows surface as 413, anything else as a bad request.
fn upload_error(context: &str, e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("{context}: {}", e.body_text()))
    } else {
        AppError::Validation(format!("{context}: {}", e.body_text()))
    }
}

fn unknown_agent(state: &AppState, key: &str) -> AppError {
    AppError::NotFound(format!(
        "Agent '{key}' not found (available: {})",
        state.agents.keys().join(", ")
    ))
}
