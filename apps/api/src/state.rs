use std::sync::Arc;

use crate::agent::registry::AgentRegistry;
use crate::config::Config;
use crate::protocol::MessageBus;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub agents: Arc<AgentRegistry>,
    /// Records every agent request and reply made through the API.
    pub bus: Arc<MessageBus>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let agents = AgentRegistry::from_config(&config);
        let bus = MessageBus::with_history_limit(config.message_history_limit);
        Self {
            config,
            agents: Arc::new(agents),
            bus: Arc::new(bus),
        }
    }
}
