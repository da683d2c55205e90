//! Agent messaging: the envelope agents and the API exchange, plus an in-process bus.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Data,
    Request,
    Response,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub message_id: String,
    pub sender: String,
    pub receiver: String,
    pub data: Value,
    pub message_type: MessageType,
    pub metadata: Map<String, Value>,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

impl AgentMessage {
    pub fn new(sender: &str, receiver: &str, data: Value, message_type: MessageType) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            data,
            message_type,
            metadata: Map::new(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Decodes a message leniently. Missing fields get defaults; input that is
    /// not a JSON object becomes an error message addressed to `error_handler`.
    pub fn from_json(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Self::from_map(map),
            Ok(_) => Self::decode_error("expected a JSON object", text),
            Err(e) => Self::decode_error(&e.to_string(), text),
        }
    }

    fn from_map(map: Map<String, Value>) -> Self {
        let text_field = |key: &str| map.get(key).and_then(Value::as_str).map(String::from);

        let mut message = Self::new(
            text_field("sender").as_deref().unwrap_or("unknown"),
            text_field("receiver").as_deref().unwrap_or("unknown"),
            map.get("data").cloned().unwrap_or_else(|| json!({})),
            map.get("message_type")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
        );
        if let Some(metadata) = map.get("metadata").and_then(Value::as_object) {
            message.metadata = metadata.clone();
        }
        if let Some(id) = text_field("message_id") {
            message.message_id = id;
        }
        if let Some(timestamp) = text_field("timestamp") {
            message.timestamp = timestamp;
        }
        message
    }

    fn decode_error(reason: &str, original: &str) -> Self {
        error!("Error creating message from JSON: {reason}");
        Self::new(
            "system",
            "error_handler",
            json!({ "error": reason, "original_data": original }),
            MessageType::Error,
        )
    }
}

impl fmt::Display for AgentMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AgentMessage({} -> {}: {:?})",
            self.sender, self.receiver, self.message_type
        )
    }
}

type Subscriber = Arc<dyn Fn(&AgentMessage) -> anyhow::Result<()> + Send + Sync>;

/// Number of messages kept when no limit is configured.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Records messages and notifies the receiver's subscribers.
///
/// History is a ring buffer: once `history_limit` messages are stored, the
/// oldest is dropped for each new one.
pub struct MessageBus {
    messages: RwLock<VecDeque<AgentMessage>>,
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    history_limit: usize,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(limit: usize) -> Self {
        let history_limit = limit.max(1);
        Self {
            messages: RwLock::new(VecDeque::with_capacity(history_limit.min(DEFAULT_HISTORY_LIMIT))),
            subscribers: RwLock::new(HashMap::new()),
            history_limit,
        }
    }

    /// Stores the message, then calls each subscriber of its receiver.
    /// Returns how many subscribers handled it without error; a failing
    /// subscriber is logged and does not stop delivery to the rest.
    pub fn send(&self, message: AgentMessage) -> usize {
        debug!("Message sent: {message}");

        {
            let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);
            if messages.len() >= self.history_limit {
                messages.pop_front();
            }
            messages.push_back(message.clone());
        }

        // Snapshot so subscribers can send without deadlocking.
        let targets: Vec<Subscriber> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message.receiver)
            .cloned()
            .unwrap_or_default();

        targets
            .iter()
            .filter(|callback| match callback(&message) {
                Ok(()) => true,
                Err(e) => {
                    error!("Error in subscriber callback for {}: {e}", message.receiver);
                    false
                }
            })
            .count()
    }

    pub fn subscribe<F>(&self, agent_name: &str, callback: F)
    where
        F: Fn(&AgentMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(agent_name.to_string())
            .or_default()
            .push(Arc::new(callback));
        debug!("Agent {agent_name} subscribed to message bus");
    }

    /// Stored messages addressed to `receiver`, oldest first.
    pub fn messages_for(&self, receiver: &str) -> Vec<AgentMessage> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| m.receiver == receiver)
            .cloned()
            .collect()
    }

    /// Messages exchanged between `a` and `b`, in send order.
    pub fn conversation(&self, a: &str, b: &str) -> Vec<AgentMessage> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| {
                (m.sender == a && m.receiver == b) || (m.sender == b && m.receiver == a)
            })
            .cloned()
            .collect()
    }

    /// Drops the stored history and returns how many messages were removed.
    /// Subscriptions are kept.
    pub fn clear(&self) -> usize {
        let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);
        let removed = messages.len();
        messages.clear();
        debug!("Cleared {removed} messages from the bus");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_new_message_has_id_and_timestamp() {
        let a = AgentMessage::new("api", "Controller", json!({}), MessageType::Request);
        let b = AgentMessage::new("api", "Controller", json!({}), MessageType::Request);
        assert_ne!(a.message_id, b.message_id);
        assert!(chrono::DateTime::parse_from_rfc3339(&a.timestamp).is_ok());
    }

    #[test]
    fn test_json_round_trip_keeps_id_and_timestamp() {
        let original = AgentMessage::new("api", "Controller", json!({"k": 1}), MessageType::Response)
            .with_metadata("agent_key", json!("controller"));
        let text = serde_json::to_string(&original).unwrap();
        assert_eq!(AgentMessage::from_json(&text), original);
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let message = AgentMessage::from_json(r#"{"sender": "parser"}"#);
        assert_eq!(message.sender, "parser");
        assert_eq!(message.receiver, "unknown");
        assert_eq!(message.data, json!({}));
        assert_eq!(message.message_type, MessageType::Data);
        assert!(message.metadata.is_empty());
    }

    #[test]
    fn test_from_json_unknown_type_defaults_to_data() {
        let message = AgentMessage::from_json(r#"{"message_type": "gossip"}"#);
        assert_eq!(message.message_type, MessageType::Data);
    }

    #[test]
    fn test_from_invalid_json_is_error_message() {
        let message = AgentMessage::from_json("not json");
        assert_eq!(message.message_type, MessageType::Error);
        assert_eq!(message.sender, "system");
        assert_eq!(message.receiver, "error_handler");
        assert_eq!(message.data["original_data"], "not json");
    }

    #[test]
    fn test_from_non_object_json_is_error_message() {
        let message = AgentMessage::from_json("[1, 2]");
        assert_eq!(message.message_type, MessageType::Error);
        assert_eq!(message.data["error"], "expected a JSON object");
    }

    #[test]
    fn test_display() {
        let message = AgentMessage::new("api", "Controller", json!({}), MessageType::Request);
        assert_eq!(message.to_string(), "AgentMessage(api -> Controller: Request)");
    }

    #[test]
    fn test_bus_notifies_receiver_subscribers_only() {
        let bus = MessageBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.subscribe("Controller", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let delivered = bus.send(AgentMessage::new("api", "Controller", json!({}), MessageType::Request));
        assert_eq!(delivered, 1);
        bus.send(AgentMessage::new("api", "Other", json!({}), MessageType::Request));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let bus = MessageBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.subscribe("Controller", |_| bail!("subscriber failed"));
        bus.subscribe("Controller", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let delivered = bus.send(AgentMessage::new("api", "Controller", json!({}), MessageType::Data));
        assert_eq!(delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.conversation("api", "Controller").len(), 1);
    }

    #[test]
    fn test_conversation_is_both_directions_in_order() {
        let bus = MessageBus::new();
        bus.send(AgentMessage::new("api", "Controller", json!(1), MessageType::Request));
        bus.send(AgentMessage::new("api", "Parser", json!(2), MessageType::Request));
        bus.send(AgentMessage::new("Controller", "api", json!(3), MessageType::Response));

        let conversation = bus.conversation("Controller", "api");
        let data: Vec<Value> = conversation.into_iter().map(|m| m.data).collect();
        assert_eq!(data, vec![json!(1), json!(3)]);
    }

    #[test]
    fn test_subscriber_may_send_on_the_same_bus() {
        let bus = Arc::new(MessageBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe("Controller", move |message| {
            inner.send(AgentMessage::new(
                "Controller",
                &message.sender,
                json!("ack"),
                MessageType::Response,
            ));
            Ok(())
        });

        bus.send(AgentMessage::new("api", "Controller", json!("req"), MessageType::Request));
        let data: Vec<Value> = bus
            .conversation("api", "Controller")
            .into_iter()
            .map(|m| m.data)
            .collect();
        assert_eq!(data, vec![json!("req"), json!("ack")]);
    }

    #[test]
    fn test_messages_for_filters_by_receiver() {
        let bus = MessageBus::new();
        bus.send(AgentMessage::new("api", "Controller", json!(1), MessageType::Request));
        bus.send(AgentMessage::new("api", "Parser", json!(2), MessageType::Request));
        bus.send(AgentMessage::new("Parser", "Controller", json!(3), MessageType::Data));

        let data: Vec<Value> = bus.messages_for("Controller").into_iter().map(|m| m.data).collect();
        assert_eq!(data, vec![json!(1), json!(3)]);
        assert!(bus.messages_for("nobody").is_empty());
    }

    #[test]
    fn test_clear_drops_history_but_keeps_subscribers() {
        let bus = MessageBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.subscribe("Controller", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        bus.send(AgentMessage::new("api", "Controller", json!(1), MessageType::Request));
        bus.send(AgentMessage::new("Controller", "api", json!(2), MessageType::Response));

        assert_eq!(bus.clear(), 2);
        assert!(bus.conversation("api", "Controller").is_empty());

        bus.send(AgentMessage::new("api", "Controller", json!(3), MessageType::Request));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(bus.messages_for("Controller").len(), 1);
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let bus = MessageBus::with_history_limit(2);
        for i in 0..5 {
            bus.send(AgentMessage::new("api", "Controller", json!(i), MessageType::Request));
        }
        let data: Vec<Value> = bus.messages_for("Controller").into_iter().map(|m| m.data).collect();
        assert_eq!(data, vec![json!(3), json!(4)]);
    }
}
