//! Wires workers, the notification queuer, the catch-up poller, and the
//! stale-claim reaper into a single lifecycle.
//!
//! `Dispatcher::start` registers every reactor's consumer group, spawns the
//! background tasks, and returns a handle; `stop` cancels them and waits for
//! the worker pool to drain in-flight batches before returning.

mod catchup;
mod notification_queuer;
mod reaper;
mod worker;

use crate::config::Config;
use crate::error::Result;
use crate::queue::WorkQueue;
use crate::reactor::Reactor;
use crate::router::Router;
use catchup::CatchUpPoller;
use notification_queuer::NotificationQueuer;
use reaper::StaleClaimReaper;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use worker::Worker;

/// Owns the background tasks started by [`Dispatcher::start`]. Dropping it
/// does not stop anything — call [`Dispatcher::stop`] explicitly.
pub struct Dispatcher {
    running: Arc<AtomicBool>,
    queue: Arc<WorkQueue<Arc<dyn Reactor>>>,
    worker_handles: Vec<JoinHandle<()>>,
    /// Notification queuer, catch-up poller, and stale-claim reaper: none
    /// hold a claim mid-flight, so they're cancelled outright rather than
    /// drained like workers.
    background_handles: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Registers each reactor's consumer group, then starts the worker
    /// pool, notification queuer, catch-up poller, and stale-claim reaper.
    pub async fn start(config: &Config, reactors: Vec<Arc<dyn Reactor>>) -> Result<Self> {
        for reactor in &reactors {
            config.store.register_consumer_group(reactor.group_id()).await?;
        }

        let queue: Arc<WorkQueue<Arc<dyn Reactor>>> = Arc::new(WorkQueue::new(1));
        let running = Arc::new(AtomicBool::new(true));
        let router = Arc::new(Router::with_default_error_strategy(
            config.store.clone(),
            config.error_strategy.clone(),
        ));
        let mut worker_handles = Vec::new();

        for i in 0..config.worker_count {
            let worker = Worker::new(
                format!("worker-{i}"),
                router.clone(),
                queue.clone(),
                config.max_drain_rounds,
                config.batch_size,
                running.clone(),
            );
            worker_handles.push(tokio::spawn(worker.run()));
        }

        let mut background_handles = Vec::new();

        let notification_queuer = NotificationQueuer::new(config.notifier.clone(), reactors.clone(), queue.clone());
        background_handles.push(tokio::spawn(notification_queuer.run()));

        let catchup = CatchUpPoller::new(reactors.clone(), queue.clone(), config.catchup_interval);
        background_handles.push(tokio::spawn(catchup.run()));

        let worker_ids: Vec<String> = (0..config.worker_count).map(|i| format!("worker-{i}")).collect();
        let reaper = StaleClaimReaper::new(
            config.store.clone(),
            worker_ids,
            config.claim_ttl_seconds,
            config.housekeeping_interval,
        );
        background_handles.push(tokio::spawn(reaper.run()));

        // Prime every reactor once so partitions with pending work at
        // startup are picked up immediately rather than waiting for the
        // first catch-up tick.
        for reactor in &reactors {
            queue.push(reactor.group_id().to_string(), reactor.clone()).await;
        }

        Ok(Self {
            running,
            queue,
            worker_handles,
            background_handles,
        })
    }

    /// Signals workers to stop after their current batch, unblocks them via
    /// sentinels, waits for them to drain, then cancels the background
    /// tasks outright.
    pub async fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        self.queue.close(self.worker_handles.len()).await;
        for handle in self.worker_handles {
            let _ = handle.await;
        }
        for handle in self.background_handles {
            handle.abort();
        }
    }
}
