//! Agents: opaque collaborators that take text in and hand back output of unknown shape.
//!
//! Every call site goes through `safe_call`, which normalizes whatever comes back
//! and turns failures into data. Nothing outside this module invokes `Agent::run`
//! directly.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::normalize::RawResponse;

pub mod command;
pub mod fallback;
pub mod handlers;
pub mod outcome;
pub mod registry;
pub mod safe_call;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent process I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("agent exited with status {}: {stderr}", exit_label(.status))]
    Exit { status: Option<i32>, stderr: String },

    #[error("agent timed out after {0}s")]
    Timeout(u64),
}

fn exit_label(status: &Option<i32>) -> String {
    status.map_or_else(|| "signal".to_string(), |code| code.to_string())
}

/// An external agent. Accepts text only; output shape is not guaranteed.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, input: &str) -> Result<RawResponse, AgentError>;
}

/// Decodes agent input text as JSON, keeping undecodable text under `raw_input`.
pub fn parse_input(input: &str) -> Value {
    serde_json::from_str(input).unwrap_or_else(|_| serde_json::json!({ "raw_input": input }))
}
