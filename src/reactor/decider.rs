//! Decider variant.
//!
//! A decider evolves state from history, then for each claimed command
//! produces events (atomically appended with a guard covering the state it
//! evolved from) plus zero or more correlated reactions. Non-command
//! messages are evolved into state but otherwise produce `Action::Ok`.

use super::{Action, ActionBatch, History, Reactor};
use crate::error::{EventlineError, Result};
use crate::error_strategy::ErrorStrategy;
use crate::guard::Condition;
use crate::message::Message;
use crate::store::Claim;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Host-defined decision logic. `Decider` is pure business logic; ordering,
/// guard construction, and correlation are handled by [`DeciderReactor`].
pub trait Decider: Send + Sync {
    fn group_id(&self) -> &str;
    fn partition_attrs(&self) -> &[String];
    /// Message types this decider issues commands for.
    fn commands(&self) -> &[String];
    /// Every message type evolved into state: commands' resulting events
    /// plus any other events this decider reads for context.
    fn evolved_types(&self) -> &[String];

    fn initial_state(&self) -> Value;
    fn evolve(&self, state: &mut Value, message: &Message);

    /// Produces the events a command results in, given current state.
    /// Events are unpositioned and carry no causation yet — the adapter
    /// sets `causation_id`/`correlation_id`.
    fn handle_command(&self, state: &Value, command: &Message) -> Result<Vec<Message>>;

    /// Produces reaction messages for an event this decider just appended.
    /// Skipped while the claim is replaying.
    fn react(&self, _state: &Value, _event: &Message) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }
}

pub struct DeciderReactor<D: Decider> {
    inner: D,
    error_strategy: Option<Arc<dyn ErrorStrategy>>,
}

impl<D: Decider> DeciderReactor<D> {
    pub fn new(decider: D) -> Self {
        Self {
            inner: decider,
            error_strategy: None,
        }
    }

    pub fn with_error_strategy(decider: D, error_strategy: Arc<dyn ErrorStrategy>) -> Self {
        Self {
            inner: decider,
            error_strategy: Some(error_strategy),
        }
    }
}

#[async_trait]
impl<D: Decider> Reactor for DeciderReactor<D> {
    fn group_id(&self) -> &str {
        self.inner.group_id()
    }

    fn partition_attrs(&self) -> &[String] {
        self.inner.partition_attrs()
    }

    fn handled_messages(&self) -> &[String] {
        self.inner.evolved_types()
    }

    fn needs_history(&self) -> bool {
        true
    }

    fn context_for(&self, partition_value: &HashMap<String, String>) -> Vec<Condition> {
        self.inner
            .evolved_types()
            .iter()
            .flat_map(|t| {
                partition_value
                    .iter()
                    .map(move |(k, v)| Condition::new(t.clone(), k.clone(), v.clone()))
            })
            .collect()
    }

    async fn handle_batch(&self, claim: &Claim, history: Option<&History>) -> Result<ActionBatch> {
        let history = history.ok_or_else(|| {
            EventlineError::Internal("decider requires history but none was supplied".into())
        })?;

        let state = Mutex::new(self.inner.initial_state());
        for message in &history.messages {
            let mut guard = state.lock().unwrap();
            self.inner.evolve(&mut guard, message);
        }

        let mut pairs = ActionBatch::new();
        for command in &claim.messages {
            if !self.inner.commands().contains(&command.message_type) {
                pairs.push((vec![Action::Ok], command.clone()));
                continue;
            }

            let events = {
                let guard = state.lock().unwrap();
                self.inner.handle_command(&guard, command)?
            };

            let correlated_events: Vec<Message> = events
                .into_iter()
                .map(|e| {
                    let mut built = e;
                    built.causation_id = command.id.clone();
                    built.correlation_id = command.correlation_id.clone();
                    built
                })
                .collect();

            for event in &correlated_events {
                let mut guard = state.lock().unwrap();
                self.inner.evolve(&mut guard, event);
            }

            // Fence against history's last position, not the claim's: the
            // claim only covers this batch, which can be a strict prefix of
            // history on backlog catch-up, and fencing against it would
            // reject appends against positions already evolved into state.
            let mut actions = vec![Action::Append(correlated_events.clone(), Some(history.guard.clone()))];

            if !claim.replaying {
                for event in &correlated_events {
                    let reactions = {
                        let guard = state.lock().unwrap();
                        self.inner.react(&guard, event)?
                    };
                    if !reactions.is_empty() {
                        let correlated_reactions: Vec<Message> = reactions
                            .into_iter()
                            .map(|mut r| {
                                r.causation_id = event.id.clone();
                                r.correlation_id = event.correlation_id.clone();
                                r
                            })
                            .collect();
                        actions.push(Action::Append(correlated_reactions, None));
                    }
                }
            }

            pairs.push((actions, command.clone()));
        }

        Ok(pairs)
    }

    fn error_strategy_override(&self) -> Option<Arc<dyn ErrorStrategy>> {
        self.error_strategy.clone()
    }
}
