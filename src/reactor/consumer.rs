//! Simple consumer.
//!
//! A plain consumer only declares `handled_messages` and `handle`; it may
//! process a batch independently per message, enabling partial
//! acknowledgement — acking up to the last successfully processed message
//! even if a later one in the same claim fails. Not applicable to deciders,
//! whose events must be appended atomically with their command's ack.

use super::{Action, ActionBatch, History, Reactor};
use crate::error::{EventlineError, Result};
use crate::error_strategy::ErrorStrategy;
use crate::message::Message;
use crate::store::Claim;
use async_trait::async_trait;
use std::sync::Arc;

pub trait SimpleConsumer: Send + Sync {
    fn group_id(&self) -> &str;
    fn partition_attrs(&self) -> &[String];
    fn handled_messages(&self) -> &[String];

    fn handle(&self, message: &Message) -> Result<Vec<Action>>;
}

/// Processes `messages` independently, one at a time. Stops at the first
/// error and returns only the pairs produced before it — the failing
/// message (and anything after it) is left unacked and will be redelivered
/// on the next claim, rather than rolling back messages already handled.
pub fn each_with_partial_ack(
    messages: &[Message],
    mut f: impl FnMut(&Message) -> Result<Vec<Action>>,
) -> ActionBatch {
    let mut pairs = ActionBatch::new();
    for message in messages {
        match f(message) {
            Ok(actions) => pairs.push((actions, message.clone())),
            Err(err) => {
                tracing::warn!(
                    message_id = %message.id,
                    error = %err,
                    "simple consumer failed on message, stopping batch for partial ack"
                );
                break;
            }
        }
    }
    pairs
}

pub struct SimpleConsumerReactor<C: SimpleConsumer> {
    inner: C,
    error_strategy: Option<Arc<dyn ErrorStrategy>>,
}

impl<C: SimpleConsumer> SimpleConsumerReactor<C> {
    pub fn new(consumer: C) -> Self {
        Self {
            inner: consumer,
            error_strategy: None,
        }
    }

    pub fn with_error_strategy(consumer: C, error_strategy: Arc<dyn ErrorStrategy>) -> Self {
        Self {
            inner: consumer,
            error_strategy: Some(error_strategy),
        }
    }
}

#[async_trait]
impl<C: SimpleConsumer> Reactor for SimpleConsumerReactor<C> {
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
        Ok(each_with_partial_ack(&claim.messages, |m| self.inner.handle(m)))
    }

    fn error_strategy_override(&self) -> Option<Arc<dyn ErrorStrategy>> {
        self.error_strategy.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stops_at_first_error_but_keeps_prior_pairs() {
        let messages = vec![
            Message::builder("t", json!({})).id("1").build(),
            Message::builder("t", json!({})).id("2").build(),
            Message::builder("t", json!({})).id("3").build(),
        ];
        let pairs = each_with_partial_ack(&messages, |m| {
            if m.id == "2" {
                Err(EventlineError::ReactorError("boom".into()))
            } else {
                Ok(vec![Action::Ok])
            }
        });
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1.id, "1");
    }
}
