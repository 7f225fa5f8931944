//! Consistency guard.
//!
//! A value object carrying the conditions a reader observed plus the
//! highest position seen within that relevant set. A conditional append
//! succeeds only if no message matching any condition has a position
//! greater than `last_position`.

use crate::message::Position;
use serde::{Deserialize, Serialize};

/// A `(message_type, key_name, key_value)` tuple defining part of a
/// "relevant set" of messages that a guard fences against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub message_type: String,
    pub key_name: String,
    pub key_value: String,
}

impl Condition {
    pub fn new(
        message_type: impl Into<String>,
        key_name: impl Into<String>,
        key_value: impl Into<String>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            key_name: key_name.into(),
            key_value: key_value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub conditions: Vec<Condition>,
    pub last_position: Position,
}

impl Guard {
    pub fn new(conditions: Vec<Condition>, last_position: Position) -> Self {
        Self {
            conditions,
            last_position,
        }
    }

    /// A guard with no conditions fences nothing; appends under it are
    /// unconditional.
    pub fn none() -> Self {
        Self {
            conditions: Vec::new(),
            last_position: 0,
        }
    }
}
