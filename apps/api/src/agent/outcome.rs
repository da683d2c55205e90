use serde::Serialize;
use serde_json::{Number, Value};

use crate::normalize::{empty_object, wrap_raw};

/// The caller-facing result of one agent call.
///
/// The key set is fixed regardless of what the agent returned; UI and logging
/// consumers rely on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutcome {
    pub success: bool,
    pub data: Value,
    pub overall_score: Number,
    pub parsed_data: Value,
    pub recommendations: Vec<String>,
    pub error: Option<String>,
}

impl AgentOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: empty_object(),
            overall_score: Number::from(0u64),
            parsed_data: empty_object(),
            recommendations: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn score(&self) -> f64 {
        self.overall_score.as_f64().unwrap_or(0.0)
    }
}

/// Projects a normalized agent response onto the outcome shape.
/// Missing or mistyped fields fall back to their defaults; nothing is validated.
pub fn format_agent_response(normalized: Value) -> AgentOutcome {
    let data = match normalized {
        Value::Object(_) => normalized,
        other => wrap_raw(other),
    };

    let overall_score = match data.get("overall_score") {
        Some(Value::Number(n)) => n.clone(),
        _ => Number::from(0u64),
    };

    let parsed_data = data
        .get("parsed_data")
        .filter(|v| v.is_object())
        .cloned()
        .unwrap_or_else(empty_object);

    let recommendations = data
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    AgentOutcome {
        success: true,
        data,
        overall_score,
        parsed_data,
        recommendations,
        error: None,
    }
}
