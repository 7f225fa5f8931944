//! Bridges the store's pub/sub channel to the work queue. Subscribes once at
//! startup; every `MessagesAppended` pushes a token to each reactor whose
//! `handled_messages` intersects the appended types, and every
//! `ReactorResumed` pushes a token to the matching group.

use crate::notifier::{Notification, Notifier};
use crate::queue::WorkQueue;
use crate::reactor::Reactor;
use std::sync::Arc;

pub struct NotificationQueuer {
    notifier: Arc<dyn Notifier>,
    reactors: Vec<Arc<dyn Reactor>>,
    queue: Arc<WorkQueue<Arc<dyn Reactor>>>,
}

impl NotificationQueuer {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        reactors: Vec<Arc<dyn Reactor>>,
        queue: Arc<WorkQueue<Arc<dyn Reactor>>>,
    ) -> Self {
        Self {
            notifier,
            reactors,
            queue,
        }
    }

    pub async fn run(self) {
        let mut rx = self.notifier.subscribe();
        loop {
            match rx.recv().await {
                Ok(Notification::MessagesAppended { types }) => {
                    for reactor in &self.reactors {
                        if reactor.handled_messages().iter().any(|t| types.contains(t)) {
                            self.queue.push(reactor.group_id().to_string(), reactor.clone()).await;
                        }
                    }
                }
                Ok(Notification::ReactorResumed { group_id }) => {
                    if let Some(reactor) = self.reactors.iter().find(|r| r.group_id() == group_id) {
                        self.queue.push(reactor.group_id().to_string(), reactor.clone()).await;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification queuer lagged; relying on catch-up poller");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}
