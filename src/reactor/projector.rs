//! Projector variants.
//!
//! A state-stored projector evolves from claim messages only and persists
//! externally via `Action::Sync`; an event-sourced projector rebuilds its
//! view from the full partition history on every claim. Both may emit
//! reactions, which are suppressed while `claim.replaying` is true.

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

pub trait StateStoredProjector: Send + Sync {
    fn group_id(&self) -> &str;
    fn partition_attrs(&self) -> &[String];
    fn handled_messages(&self) -> &[String];

    /// Produces the actions (typically `Action::Sync` wrapping an external
    /// write) for a single claimed message.
    fn handle(&self, message: &Message) -> Result<Vec<Action>>;

    fn react(&self, _message: &Message) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }
}

pub struct StateStoredProjectorReactor<P: StateStoredProjector> {
    inner: P,
    error_strategy: Option<Arc<dyn ErrorStrategy>>,
}

impl<P: StateStoredProjector> StateStoredProjectorReactor<P> {
    pub fn new(projector: P) -> Self {
        Self {
            inner: projector,
            error_strategy: None,
        }
    }

    pub fn with_error_strategy(projector: P, error_strategy: Arc<dyn ErrorStrategy>) -> Self {
        Self {
            inner: projector,
            error_strategy: Some(error_strategy),
        }
    }
}

#[async_trait]
impl<P: StateStoredProjector> Reactor for StateStoredProjectorReactor<P> {
    fn group_id(&self) -> &str {
        self.inner.group_id()
    }

    fn partition_attrs(&self) -> &[String] {
        self.inner.partition_attrs()
    }

    fn handled_messages(&self) -> &[String] {
        self.inner.handled_messages()
    }

    async fn handle_batch(&self, claim: &Claim, _history: Option<&History>) -> Result<ActionBatch> {
        let mut pairs = ActionBatch::new();
        for message in &claim.messages {
            let mut actions = self.inner.handle(message)?;
            if !claim.replaying {
                let reactions = self.inner.react(message)?;
                if !reactions.is_empty() {
                    actions.push(Action::Append(
                        reactions
                            .into_iter()
                            .map(|mut r| {
                                r.causation_id = message.id.clone();
                                r.correlation_id = message.correlation_id.clone();
                                r
                            })
                            .collect(),
                        None,
                    ));
                }
            }
            pairs.push((actions, message.clone()));
        }
        Ok(pairs)
    }

    fn error_strategy_override(&self) -> Option<Arc<dyn ErrorStrategy>> {
        self.error_strategy.clone()
    }
}

pub trait EventSourcedProjector: Send + Sync {
    fn group_id(&self) -> &str;
    fn partition_attrs(&self) -> &[String];
    fn handled_messages(&self) -> &[String];

    fn initial_state(&self) -> Value;
    fn evolve(&self, state: &mut Value, message: &Message);

    fn handle(&self, state: &Value, message: &Message) -> Result<Vec<Action>>;

    fn react(&self, _state: &Value, _message: &Message) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }
}

pub struct EventSourcedProjectorReactor<P: EventSourcedProjector> {
    inner: P,
    error_strategy: Option<Arc<dyn ErrorStrategy>>,
}

impl<P: EventSourcedProjector> EventSourcedProjectorReactor<P> {
    pub fn new(projector: P) -> Self {
        Self {
            inner: projector,
            error_strategy: None,
        }
    }

    pub fn with_error_strategy(projector: P, error_strategy: Arc<dyn ErrorStrategy>) -> Self {
        Self {
            inner: projector,
            error_strategy: Some(error_strategy),
        }
    }
}

#[async_trait]
impl<P: EventSourcedProjector> Reactor for EventSourcedProjectorReactor<P> {
    fn group_id(&self) -> &str {
        self.inner.group_id()
    }

    fn partition_attrs(&self) -> &[String] {
        self.inner.partition_attrs()
    }

    fn handled_messages(&self) -> &[String] {
        self.inner.handled_messages()
    }

    fn needs_history(&self) -> bool {
        true
    }

    fn context_for(&self, partition_value: &HashMap<String, String>) -> Vec<Condition> {
        self.inner
            .handled_messages()
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
            EventlineError::Internal("event-sourced projector requires history but none was supplied".into())
        })?;

        let state = Mutex::new(self.inner.initial_state());
        for message in &history.messages {
            let mut guard = state.lock().unwrap();
            self.inner.evolve(&mut guard, message);
        }

        let mut pairs = ActionBatch::new();
        for message in &claim.messages {
            {
                let mut guard = state.lock().unwrap();
                self.inner.evolve(&mut guard, message);
            }
            let mut actions = {
                let guard = state.lock().unwrap();
                self.inner.handle(&guard, message)?
            };
            if !claim.replaying {
                let reactions = {
                    let guard = state.lock().unwrap();
                    self.inner.react(&guard, message)?
                };
                if !reactions.is_empty() {
                    actions.push(Action::Append(
                        reactions
                            .into_iter()
                            .map(|mut r| {
                                r.causation_id = message.id.clone();
                                r.correlation_id = message.correlation_id.clone();
                                r
                            })
                            .collect(),
                        None,
                    ));
                }
            }
            pairs.push((actions, message.clone()));
        }
        Ok(pairs)
    }

    fn error_strategy_override(&self) -> Option<Arc<dyn ErrorStrategy>> {
        self.error_strategy.clone()
    }
}
