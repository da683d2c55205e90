use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::agent::command::CommandAgent;
use crate::agent::fallback::FallbackAgent;
use crate::agent::Agent;
use crate::config::Config;

pub const CONTROLLER_AGENT: &str = "controller";
pub const RESUME_PARSER_AGENT: &str = "resume_parser";

/// Agents addressable by key from the HTTP API.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default wiring: the controller runs `AGENT_COMMAND` when configured,
    /// everything else falls back to placeholder agents.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        let controller: Arc<dyn Agent> = match config.agent_command.as_deref().and_then(|cmd| {
            CommandAgent::from_command_line(
                "Controller",
                cmd,
                Duration::from_secs(config.agent_timeout_secs),
            )
        }) {
            Some(agent) => {
                info!("Controller agent backed by external command");
                Arc::new(agent)
            }
            None => Arc::new(FallbackAgent::new("Controller")),
        };

        registry.register(CONTROLLER_AGENT, controller);
        registry.register(
            RESUME_PARSER_AGENT,
            Arc::new(FallbackAgent::new("ResumeParser")),
        );
        registry
    }

    pub fn register(&mut self, key: &str, agent: Arc<dyn Agent>) {
        self.agents.insert(key.to_string(), agent);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(key).cloned()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
