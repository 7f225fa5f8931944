//! Interval-based fallback that guarantees progress even if a notification
//! is lost or a reactor was never woken.

use crate::queue::WorkQueue;
use crate::reactor::Reactor;
use std::sync::Arc;
use tokio::time::{interval, Duration};

pub struct CatchUpPoller {
    reactors: Vec<Arc<dyn Reactor>>,
    queue: Arc<WorkQueue<Arc<dyn Reactor>>>,
    interval: Duration,
}

impl CatchUpPoller {
    pub fn new(reactors: Vec<Arc<dyn Reactor>>, queue: Arc<WorkQueue<Arc<dyn Reactor>>>, interval: Duration) -> Self {
        Self {
            reactors,
            queue,
            interval,
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;
            for reactor in &self.reactors {
                self.queue.push(reactor.group_id().to_string(), reactor.clone()).await;
            }
        }
    }
}
