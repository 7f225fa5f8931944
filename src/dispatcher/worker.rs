//! A single worker: pops reactor tokens and drains them.

use crate::queue::WorkQueue;
use crate::reactor::Reactor;
use crate::router::Router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Worker {
    pub name: String,
    router: Arc<Router>,
    queue: Arc<WorkQueue<Arc<dyn Reactor>>>,
    max_drain_rounds: usize,
    batch_size: usize,
    running: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        name: String,
        router: Arc<Router>,
        queue: Arc<WorkQueue<Arc<dyn Reactor>>>,
        max_drain_rounds: usize,
        batch_size: usize,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name,
            router,
            queue,
            max_drain_rounds,
            batch_size,
            running,
        }
    }

    pub async fn run(self) {
        while let Some(reactor) = self.queue.pop().await {
            if !self.running.load(Ordering::Relaxed) {
                break;
            }
            self.drain(reactor).await;
        }
    }

    /// Works a single reactor until it has no more pending work or the
    /// round cap is hit, in which case the reactor is re-enqueued so other
    /// reactors get a turn instead of starving behind one hot reactor.
    async fn drain(&self, reactor: Arc<dyn Reactor>) {
        let mut rounds = 0usize;
        while self.running.load(Ordering::Relaxed) && rounds < self.max_drain_rounds {
            let worked = match self.router.handle_next_for(&reactor, &self.name, self.batch_size).await {
                Ok(worked) => worked,
                Err(err) => {
                    tracing::error!(worker = %self.name, group_id = reactor.group_id(), error = %err, "router error while draining reactor");
                    return;
                }
            };
            if !worked {
                return;
            }
            rounds += 1;
        }
        let group_id = reactor.group_id().to_string();
        if !self.queue.push(group_id, reactor).await {
            tracing::debug!(worker = %self.name, "reactor already has a pending token; drain will resume via catch-up");
        }
    }
}
