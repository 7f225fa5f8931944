//! The reactor execution protocol: deciders, projectors, and plain
//! consumers all reduce to the same `handle_batch` contract.

pub mod consumer;
pub mod decider;
pub mod projector;

use crate::error::{EventlineError, Result};
use crate::error_strategy::ErrorStrategy;
use crate::guard::{Condition, Guard};
use crate::message::Message;
use crate::store::{Claim, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The full partition history, read when a reactor's `needs_history`
/// returns true.
#[derive(Debug, Clone)]
pub struct History {
    pub messages: Vec<Message>,
    pub guard: Guard,
}

/// A side effect a reactor wants committed atomically with the batch's ack.
pub enum Action {
    /// No side effect; used to acknowledge a message that produced
    /// nothing.
    Ok,
    /// Append these messages; conditional if a guard is supplied.
    Append(Vec<Message>, Option<Guard>),
    /// Run an in-process side effect inside the same logical transaction
    /// that commits the batch. An `Err` return aborts the whole batch.
    Sync(Box<dyn FnOnce() -> Result<()> + Send>),
    /// Append with a future `created_at`; delivery waits until that time.
    Schedule(Vec<Message>, DateTime<Utc>),
}

impl Action {
    /// Validates `Schedule`'s constraint that `at` is in the future.
    pub fn schedule(messages: Vec<Message>, at: DateTime<Utc>, now: DateTime<Utc>) -> Result<Action> {
        if at <= now {
            return Err(EventlineError::PastMessageDate(at.to_rfc3339()));
        }
        Ok(Action::Schedule(messages, at))
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Ok => write!(f, "Action::Ok"),
            Action::Append(msgs, guard) => {
                write!(f, "Action::Append({} messages, guard={})", msgs.len(), guard.is_some())
            }
            Action::Sync(_) => write!(f, "Action::Sync(<fn>)"),
            Action::Schedule(msgs, at) => write!(f, "Action::Schedule({} messages, at={})", msgs.len(), at),
        }
    }
}

/// One `(actions, source_message)` pair produced by `handle_batch`. The ack
/// for the last pair in a batch is what advances the offset.
pub type ActionBatch = Vec<(Vec<Action>, Message)>;

/// Lets an error strategy mutate the consumer group that owns a failed
/// claim.
pub struct GroupProxy {
    store: Arc<dyn Store>,
    group_id: String,
}

impl GroupProxy {
    pub fn new(store: Arc<dyn Store>, group_id: impl Into<String>) -> Self {
        Self {
            store,
            group_id: group_id.into(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub async fn retry(&self, at: DateTime<Utc>, context: serde_json::Value) -> Result<()> {
        self.store
            .set_group_error(&self.group_id, context, Some(at))
            .await
    }

    /// The group's current `error_context`, used by sticky error
    /// strategies to carry state (e.g. a retry counter) between
    /// invocations.
    pub async fn error_context(&self) -> Result<Option<serde_json::Value>> {
        Ok(self
            .store
            .get_consumer_group(&self.group_id)
            .await?
            .and_then(|g| g.error_context))
    }

    pub async fn stop(&self, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        self.store
            .set_group_error(&self.group_id, serde_json::json!({ "reason": reason }), None)
            .await?;
        self.store.stop_consumer_group(&self.group_id).await
    }
}

#[async_trait]
pub trait Reactor: Send + Sync {
    fn group_id(&self) -> &str;
    fn partition_attrs(&self) -> &[String];
    fn handled_messages(&self) -> &[String];

    /// Whether the router should load the full partition history before
    /// calling `handle_batch`. Determined at registration time by
    /// inspecting the reactor's declared needs.
    fn needs_history(&self) -> bool {
        false
    }

    /// Conditions used to load history for a given partition. Only called
    /// when `needs_history` is true.
    fn context_for(&self, _partition_value: &std::collections::HashMap<String, String>) -> Vec<Condition> {
        Vec::new()
    }

    async fn handle_batch(&self, claim: &Claim, history: Option<&History>) -> Result<ActionBatch>;

    /// This reactor's own error strategy, if it was built with one. `None`
    /// means defer to the router's configured default.
    fn error_strategy_override(&self) -> Option<Arc<dyn ErrorStrategy>> {
        None
    }
}
