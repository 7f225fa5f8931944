//! Pub/sub notification channel.
//!
//! The store emits [`Notification`]s after a successful append or when a
//! consumer group resumes; the dispatcher's notification queuer subscribes
//! and turns them into work-queue pushes. [`InlineNotifier`] is the
//! in-process implementation for stores without native pub/sub (e.g. no
//! LISTEN/NOTIFY backend); a database-backed notifier would implement the
//! same trait over its own channel.

use async_trait::async_trait;
use tokio::sync::broadcast;

pub const CHANNEL_MESSAGES_APPENDED: &str = "messages_appended";
pub const CHANNEL_REACTOR_RESUMED: &str = "reactor_resumed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Comma-separated-at-the-wire, but carried here as a deduplicated
    /// list of distinct message types just appended.
    MessagesAppended { types: Vec<String> },
    /// A group id that just transitioned `stopped -> active`.
    ReactorResumed { group_id: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);

    /// Subscribe to future notifications.
    fn subscribe(&self) -> broadcast::Receiver<Notification>;
}

/// In-process notifier built on a broadcast channel. Every subscriber
/// receives every notification; there is no channel-name filtering at this
/// layer — the dispatcher's notification queuer does the type/group
/// matching.
pub struct InlineNotifier {
    sender: broadcast::Sender<Notification>,
}

impl InlineNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }
}

impl Default for InlineNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for InlineNotifier {
    async fn notify(&self, notification: Notification) {
        // No active subscribers is not an error: the catch-up poller still
        // guarantees progress.
        let _ = self.sender.send(notification);
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_notifications() {
        let notifier = InlineNotifier::new();
        let mut rx = notifier.subscribe();
        notifier
            .notify(Notification::MessagesAppended {
                types: vec!["orders.created".to_string()],
            })
            .await;
        let received = rx.recv().await.unwrap();
        assert_eq!(
            received,
            Notification::MessagesAppended {
                types: vec!["orders.created".to_string()]
            }
        );
    }
}
