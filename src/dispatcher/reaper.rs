//! Worker heartbeat + stale-claim reaping.
//!
//! A worker that crashed or hung mid-batch holds a claim forever unless
//! something else releases it. This task records liveness for the
//! dispatcher's workers and periodically releases claims held by workers not
//! seen within `claim_ttl_seconds`, making them eligible for re-claim.

use crate::store::Store;
use std::sync::Arc;
use tokio::time::{interval, Duration};

pub struct StaleClaimReaper {
    store: Arc<dyn Store>,
    worker_ids: Vec<String>,
    claim_ttl_seconds: i64,
    interval: Duration,
}

impl StaleClaimReaper {
    pub fn new(store: Arc<dyn Store>, worker_ids: Vec<String>, claim_ttl_seconds: i64, interval: Duration) -> Self {
        Self {
            store,
            worker_ids,
            claim_ttl_seconds,
            interval,
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.store.worker_heartbeat(&self.worker_ids, None).await {
                tracing::error!(error = %err, "failed to record worker heartbeat");
                continue;
            }
            match self.store.release_stale_claims(self.claim_ttl_seconds).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(released = n, "released stale claims"),
                Err(err) => tracing::error!(error = %err, "failed to release stale claims"),
            }
        }
    }
}
