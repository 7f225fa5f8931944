//! Message type registry: maps a message type to the validator for its
//! concrete payload schema.
//!
//! Hosts register a validator per message type at startup; deserializing an
//! inbound message at the process boundary goes through
//! [`MessageRegistry::validate`], which raises [`EventlineError::UnknownMessage`]
//! for a type with no registered validator and [`EventlineError::InvalidMessage`]
//! when the validator rejects the payload. The store itself stays
//! schema-agnostic — this check happens at the call site that deserializes
//! untrusted input, not inside `Store::append`.

use crate::error::{EventlineError, Result};
use crate::message::Message;
use std::collections::HashMap;

type Validator = Box<dyn Fn(&serde_json::Value) -> Result<()> + Send + Sync>;

#[derive(Default)]
pub struct MessageRegistry {
    validators: HashMap<String, Validator>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `message_type` with a validator run against its payload.
    /// A later call for the same type replaces the prior validator.
    pub fn register<F>(&mut self, message_type: impl Into<String>, validator: F)
    where
        F: Fn(&serde_json::Value) -> Result<()> + Send + Sync + 'static,
    {
        self.validators.insert(message_type.into(), Box::new(validator));
    }

    /// Registers `message_type` with no payload validation beyond being a
    /// known type.
    pub fn register_unchecked(&mut self, message_type: impl Into<String>) {
        self.register(message_type, |_| Ok(()));
    }

    pub fn is_registered(&self, message_type: &str) -> bool {
        self.validators.contains_key(message_type)
    }

    pub fn validate(&self, message: &Message) -> Result<()> {
        let validator = self
            .validators
            .get(&message.message_type)
            .ok_or_else(|| EventlineError::UnknownMessage(message.message_type.clone()))?;
        validator(&message.payload)
            .map_err(|err| EventlineError::InvalidMessage(format!("{}: {err}", message.message_type)))
    }
}
