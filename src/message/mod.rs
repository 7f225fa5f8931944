//! Immutable messages: commands and events.
//!
//! A `Message` is produced once, via [`MessageBuilder`], and never mutated
//! after that. `id`, `causation_id`, and `correlation_id` are fixed at
//! construction; `position` is assigned later by the store on append.

pub mod keys;
pub mod registry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub use keys::{extract_keys, KeyPair};
pub use registry::MessageRegistry;

/// Monotonic 64-bit position assigned by the store. Dense across the whole
/// store, not per partition.
pub type Position = u64;

/// A single immutable message: a command or an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub stream_id: Option<String>,
    pub position: Option<Position>,
    pub seq: Option<u64>,
    pub causation_id: String,
    pub correlation_id: String,
    pub payload: Value,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn builder(message_type: impl Into<String>, payload: Value) -> MessageBuilder {
        MessageBuilder::new(message_type, payload)
    }

    /// Extracted `(name, value)` pairs for this message's payload.
    pub fn extracted_keys(&self) -> Vec<KeyPair> {
        extract_keys(&self.payload)
    }

    /// Whether this message declares a value for every named attribute.
    pub fn declares_all(&self, attrs: &[String]) -> bool {
        let keys = self.extracted_keys();
        attrs
            .iter()
            .all(|attr| keys.iter().any(|(name, _)| name == attr))
    }
}

/// Builds a [`Message`], defaulting `causation_id`/`correlation_id` to the
/// message's own `id`.
pub struct MessageBuilder {
    id: String,
    message_type: String,
    stream_id: Option<String>,
    causation_id: Option<String>,
    correlation_id: Option<String>,
    payload: Value,
    metadata: HashMap<String, Value>,
    created_at: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            stream_id: None,
            causation_id: None,
            correlation_id: None,
            payload,
            metadata: HashMap::new(),
            created_at: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    pub fn caused_by(mut self, source: &Message) -> Self {
        self.causation_id = Some(source.id.clone());
        self.correlation_id = Some(source.correlation_id.clone());
        self
    }

    pub fn causation_id(mut self, id: impl Into<String>) -> Self {
        self.causation_id = Some(id.into());
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn build(self) -> Message {
        let causation_id = self.causation_id.unwrap_or_else(|| self.id.clone());
        let correlation_id = self.correlation_id.unwrap_or_else(|| self.id.clone());
        Message {
            id: self.id,
            message_type: self.message_type,
            stream_id: self.stream_id,
            position: None,
            seq: None,
            causation_id,
            correlation_id,
            payload: self.payload,
            metadata: self.metadata,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_causation_and_correlation_to_own_id() {
        let m = Message::builder("orders.created", json!({"order_id": "O1"})).build();
        assert_eq!(m.causation_id, m.id);
        assert_eq!(m.correlation_id, m.id);
    }

    #[test]
    fn caused_by_propagates_correlation_not_causation() {
        let root = Message::builder("orders.create", json!({"order_id": "O1"})).build();
        let event = Message::builder("orders.created", json!({"order_id": "O1"}))
            .caused_by(&root)
            .build();
        assert_eq!(event.causation_id, root.id);
        assert_eq!(event.correlation_id, root.correlation_id);
    }

    #[test]
    fn round_trip_identity() {
        let m = Message::builder("orders.created", json!({"order_id": "O1", "total": 42})).build();
        let encoded = serde_json::to_string(&m).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(m, decoded);
    }
}
