//! Configuration surface.
//!
//! A single value the host builds once and owns, generalized to a builder
//! because `store` is required and several fields are trait objects that
//! can't implement `Default`. `error_strategy` is the dispatcher-wide
//! default; a reactor built with its own `with_error_strategy` override
//! takes precedence over it.

use crate::error::{EventlineError, Result};
use crate::error_strategy::{ErrorStrategy, StopImmediately};
use crate::notifier::{InlineNotifier, Notifier};
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;

pub struct Config {
    pub worker_count: usize,
    pub batch_size: usize,
    pub max_drain_rounds: usize,
    pub catchup_interval: Duration,
    pub housekeeping_interval: Duration,
    pub claim_ttl_seconds: i64,
    pub error_strategy: Arc<dyn ErrorStrategy>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn Store>,
}

impl Config {
    pub fn builder(store: Arc<dyn Store>) -> ConfigBuilder {
        ConfigBuilder::new(store)
    }
}

pub struct ConfigBuilder {
    worker_count: usize,
    batch_size: usize,
    max_drain_rounds: usize,
    catchup_interval: Duration,
    housekeeping_interval: Duration,
    claim_ttl_seconds: i64,
    error_strategy: Arc<dyn ErrorStrategy>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn Store>,
}

impl ConfigBuilder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            worker_count: 4,
            batch_size: 100,
            max_drain_rounds: 50,
            catchup_interval: Duration::from_secs(5),
            housekeeping_interval: Duration::from_secs(10),
            claim_ttl_seconds: 60,
            error_strategy: Arc::new(StopImmediately),
            notifier: Arc::new(InlineNotifier::new()),
            store,
        }
    }

    pub fn worker_count(mut self, n: usize) -> Self {
        self.worker_count = n;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn max_drain_rounds(mut self, n: usize) -> Self {
        self.max_drain_rounds = n;
        self
    }

    pub fn catchup_interval(mut self, interval: Duration) -> Self {
        self.catchup_interval = interval;
        self
    }

    pub fn housekeeping_interval(mut self, interval: Duration) -> Self {
        self.housekeeping_interval = interval;
        self
    }

    pub fn claim_ttl_seconds(mut self, seconds: i64) -> Self {
        self.claim_ttl_seconds = seconds;
        self
    }

    pub fn error_strategy(mut self, strategy: Arc<dyn ErrorStrategy>) -> Self {
        self.error_strategy = strategy;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn build(self) -> Result<Config> {
        if self.worker_count == 0 {
            return Err(EventlineError::InvalidConfig(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EventlineError::InvalidConfig(
                "batch_size must be at least 1".into(),
            ));
        }
        Ok(Config {
            worker_count: self.worker_count,
            batch_size: self.batch_size,
            max_drain_rounds: self.max_drain_rounds,
            catchup_interval: self.catchup_interval,
            housekeeping_interval: self.housekeeping_interval,
            claim_ttl_seconds: self.claim_ttl_seconds,
            error_strategy: self.error_strategy,
            notifier: self.notifier,
            store: self.store,
        })
    }
}
