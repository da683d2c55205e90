//! Agent backed by an external program.
//!
//! The input is written to the program's stdin and its stdout is returned as raw
//! text, so the program may print JSON, fenced JSON, or prose; the normalizer
//! sorts it out.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::agent::{Agent, AgentError};
use crate::normalize::RawResponse;

pub struct CommandAgent {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAgent {
    pub fn new(name: &str, program: &str, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args,
            timeout,
        }
    }

    /// Builds an agent from a whitespace-separated command line.
    /// Returns `None` for a blank command line.
    pub fn from_command_line(name: &str, command_line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self::new(name, &program, parts.collect(), timeout))
    }
}

#[async_trait]
impl Agent for CommandAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: &str) -> Result<RawResponse, AgentError> {
        debug!("Spawning agent process: {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let write_input = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(input.as_bytes()).await {
                    // The program may exit without reading its input.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
            }
            Ok::<(), std::io::Error>(())
        };

        let exchange = async {
            let (written, output) = tokio::join!(write_input, child.wait_with_output());
            written?;
            output
        };

        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| AgentError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(AgentError::Exit {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(RawResponse::Text(
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> CommandAgent {
        CommandAgent::new("Shell", "sh", vec!["-c".to_string(), script.to_string()], timeout)
    }

    #[test]
    fn test_from_command_line_splits_args() {
        let agent =
            CommandAgent::from_command_line("Controller", "python3 agent.py --json", Duration::from_secs(1))
                .unwrap();
        assert_eq!(agent.program, "python3");
        assert_eq!(agent.args, vec!["agent.py", "--json"]);
    }

    #[test]
    fn test_from_blank_command_line_is_none() {
        assert!(CommandAgent::from_command_line("Controller", "   ", Duration::from_secs(1)).is_none());
    }

    #[tokio::test]
    async fn test_stdout_is_returned_as_text() {
        let agent = CommandAgent::new("Cat", "cat", Vec::new(), Duration::from_secs(5));
        let raw = agent.run(r#"{"overall_score": 7}"#).await.unwrap();
        assert_eq!(raw, RawResponse::Text(r#"{"overall_score": 7}"#.to_string()));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let agent = sh("echo boom >&2; exit 3", Duration::from_secs(5));
        match agent.run("ignored").await {
            Err(AgentError::Exit { status, stderr }) => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected exit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_program_times_out() {
        let agent = sh("sleep 5", Duration::from_millis(100));
        assert!(matches!(agent.run("").await, Err(AgentError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let agent = CommandAgent::new(
            "Missing",
            "/nonexistent/jobsniper-agent",
            Vec::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(agent.run("").await, Err(AgentError::Io(_))));
    }
}
