use std::fmt::Display;
use std::future::Future;

use serde_json::Value;
use tracing::{error, info};

use crate::agent::outcome::{format_agent_response, AgentOutcome};
use crate::agent::Agent;
use crate::normalize::{encode_payload, normalize_response, RawResponse};

/// Calls an agent once and always returns an outcome.
///
/// Object payloads are sent as JSON text, string payloads verbatim. An `Err`
/// from the agent becomes a failure outcome carrying its message; a successful
/// return is normalized and formatted. No retries and no timeout are applied
/// here; those belong to the agent.
pub async fn safe_agent_call<F, Fut, R, E>(
    agent_fn: F,
    input: &Value,
    agent_name: &str,
) -> AgentOutcome
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: Into<RawResponse>,
    E: Display,
{
    info!("Calling {agent_name} agent...");

    match agent_fn(encode_input(input)).await {
        Ok(raw) => {
            let outcome = format_agent_response(normalize_response(raw, None));
            info!("{agent_name} agent completed successfully");
            outcome
        }
        Err(e) => {
            error!("Error in {agent_name} agent: {e}");
            AgentOutcome::failure(e.to_string())
        }
    }
}

/// Runs a registered agent through [`safe_agent_call`].
pub async fn run_agent(agent: &dyn Agent, input: &Value) -> AgentOutcome {
    safe_agent_call(
        |encoded| async move { agent.run(&encoded).await },
        input,
        agent.name(),
    )
    .await
}

fn encode_input(input: &Value) -> String {
    match input {
        Value::Object(_) => encode_payload(input),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentError;
    use anyhow::anyhow;
    use serde_json::{json, Number};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_structured_return_is_formatted() {
        let outcome = safe_agent_call(
            |_| async { Ok::<_, anyhow::Error>(json!({"overall_score": 7})) },
            &json!("resume"),
            "Controller",
        )
        .await;
        assert!(outcome.success);
        assert_eq!(outcome.overall_score, Number::from(7u64));
        assert_eq!(outcome.data, json!({"overall_score": 7}));
    }

    #[tokio::test]
    async fn test_text_return_matches_structured_return() {
        let structured = safe_agent_call(
            |_| async { Ok::<_, anyhow::Error>(json!({"overall_score": 7})) },
            &json!("resume"),
            "Controller",
        )
        .await;
        let textual = safe_agent_call(
            |_| async { Ok::<_, anyhow::Error>(r#"{"overall_score": 7}"#.to_string()) },
            &json!("resume"),
            "Controller",
        )
        .await;
        assert_eq!(structured, textual);
    }

    #[tokio::test]
    async fn test_plain_text_return_is_wrapped() {
        let outcome = safe_agent_call(
            |_| async { Ok::<_, anyhow::Error>("not json") },
            &json!("resume"),
            "Controller",
        )
        .await;
        assert!(outcome.success);
        assert_eq!(outcome.data, json!({"raw_response": "not json"}));
        assert_eq!(outcome.score(), 0.0);
    }

    #[tokio::test]
    async fn test_agent_fault_becomes_failure_outcome() {
        let outcome = safe_agent_call(
            |_| async { Err::<Value, _>(anyhow!("timeout")) },
            &json!({"resume_text": "..."}),
            "Controller",
        )
        .await;
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("timeout"));
        assert_eq!(value["data"], json!({}));
        assert_eq!(value["overall_score"], json!(0));
    }

    #[tokio::test]
    async fn test_agent_error_message_is_kept() {
        let outcome = safe_agent_call(
            |_| async { Err::<Value, _>(AgentError::Timeout(30)) },
            &json!("resume"),
            "Controller",
        )
        .await;
        assert_eq!(outcome.error.as_deref(), Some("agent timed out after 30s"));
    }

    #[tokio::test]
    async fn test_input_encoding() {
        let seen = Mutex::new(Vec::new());
        for input in [json!({"a": 1}), json!("plain text"), json!([1, 2]), json!(5)] {
            safe_agent_call(
                |encoded| {
                    seen.lock().unwrap().push(encoded);
                    async { Ok::<_, anyhow::Error>(Value::Null) }
                },
                &input,
                "Recorder",
            )
            .await;
        }
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                r#"{"a":1}"#.to_string(),
                "plain text".to_string(),
                "[1,2]".to_string(),
                "5".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_scalar_return_yields_empty_data() {
        let outcome = safe_agent_call(
            |_| async { Ok::<_, anyhow::Error>(json!(42)) },
            &json!("resume"),
            "Controller",
        )
        .await;
        assert!(outcome.success);
        assert_eq!(outcome.data, json!({}));
    }
}
