//! Pluggable error-strategy policy.
//!
//! The router hands every non-`ConcurrentAppend` failure to an
//! [`ErrorStrategy`]. Strategies are sticky — state between invocations is
//! kept in the consumer group's `error_context` — so "retry N times then
//! stop" can be built without the strategy object itself holding per-group
//! counters.

use crate::error::EventlineError;
use crate::message::Message;
use crate::reactor::GroupProxy;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

#[async_trait]
pub trait ErrorStrategy: Send + Sync {
    async fn handle(&self, exception: &EventlineError, message: &Message, group: &GroupProxy);
}

/// Retries up to `max_retries` times with a fixed backoff, then stops the
/// group. The retry count is read back from and written to the group's
/// `error_context`, so it survives across process restarts as long as the
/// store does.
pub struct RetryThenStop {
    pub max_retries: u32,
    pub backoff: ChronoDuration,
}

impl RetryThenStop {
    pub fn new(max_retries: u32, backoff: ChronoDuration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }
}

#[async_trait]
impl ErrorStrategy for RetryThenStop {
    async fn handle(&self, exception: &EventlineError, message: &Message, group: &GroupProxy) {
        let previous_count = group
            .error_context()
            .await
            .ok()
            .flatten()
            .and_then(|ctx| ctx.get("retry_count").and_then(|v| v.as_u64()))
            .unwrap_or(0);
        let retry_count = previous_count + 1;

        let context = json!({
            "retry_count": retry_count,
            "last_error": exception.to_string(),
            "last_message_id": message.id,
        });

        if retry_count <= self.max_retries as u64 {
            let at = Utc::now() + self.backoff;
            let _ = group.retry(at, context).await;
        } else {
            let _ = group
                .stop(format!(
                    "exceeded {} retries: {exception}",
                    self.max_retries
                ))
                .await;
        }
    }
}

/// Stops the group on the first error. Useful for strict pipelines where
/// any failure should halt processing until a human intervenes.
pub struct StopImmediately;

#[async_trait]
impl ErrorStrategy for StopImmediately {
    async fn handle(&self, exception: &EventlineError, message: &Message, group: &GroupProxy) {
        let _ = group
            .stop(format!("stopped on first error at message {}: {exception}", message.id))
            .await;
    }
}
