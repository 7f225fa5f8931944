//! Row types shared by every store backend: consumer groups, offsets, and
//! worker heartbeats.

use crate::guard::Guard;
use crate::message::{Message, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStatus {
    Active,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerGroup {
    pub group_id: String,
    pub status: GroupStatus,
    pub retry_at: Option<DateTime<Utc>>,
    pub error_context: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConsumerGroup {
    pub fn new(group_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            group_id: group_id.into(),
            status: GroupStatus::Active,
            retry_at: None,
            error_context: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// A group is eligible for claims if active, or stopped-with-retry_at
    /// that has already passed (error strategy retry path).
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            GroupStatus::Active => self.retry_at.map(|at| now >= at).unwrap_or(true),
            GroupStatus::Stopped => false,
        }
    }
}

/// Per-(group, partition) cursor into the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offset {
    pub id: String,
    pub group_id: String,
    pub partition_key: String,
    pub partition_value: HashMap<String, String>,
    pub last_position: Position,
    pub claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
}

impl Offset {
    pub fn new(
        id: impl Into<String>,
        group_id: impl Into<String>,
        partition_key: impl Into<String>,
        partition_value: HashMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            group_id: group_id.into(),
            partition_key: partition_key.into(),
            partition_value,
            last_position: 0,
            claimed: false,
            claimed_at: None,
            claimed_by: None,
        }
    }
}

/// One partition's worth of pending work, leased to a single worker.
#[derive(Debug, Clone)]
pub struct Claim {
    pub offset_id: String,
    pub group_id: String,
    pub partition_key: String,
    pub partition_value: HashMap<String, String>,
    pub messages: Vec<Message>,
    pub replaying: bool,
    pub guard: Guard,
}
