//! Bounded MPMC work queue with a per-reactor token cap.
//!
//! A token's presence is a wake-up signal, not a count of work — pushing a
//! second token for a reactor that already has `max_per_reactor` pending is
//! a no-op. Built on `tokio::sync::Mutex` + `tokio::sync::Notify`, the
//! async-friendly analogue of the mutex + condition variable discipline.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

enum Item<T> {
    Token(String, T),
    Sentinel,
}

struct State<T> {
    queue: VecDeque<Item<T>>,
    pending_counts: HashMap<String, usize>,
    max_per_reactor: usize,
}

pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

impl<T: Clone + Send + 'static> WorkQueue<T> {
    pub fn new(max_per_reactor: usize) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                pending_counts: HashMap::new(),
                max_per_reactor: max_per_reactor.max(1),
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueue a token for `key`. Returns `false` without blocking if
    /// `key` already has `max_per_reactor` tokens pending.
    pub async fn push(&self, key: impl Into<String>, item: T) -> bool {
        let key = key.into();
        let mut state = self.state.lock().await;
        let max_per_reactor = state.max_per_reactor;
        let count = state.pending_counts.entry(key.clone()).or_insert(0);
        if *count >= max_per_reactor {
            return false;
        }
        *count += 1;
        state.queue.push_back(Item::Token(key, item));
        drop(state);
        self.notify.notify_one();
        true
    }

    /// Blocks until a token is available or the queue is closed, in which
    /// case it returns `None`.
    pub async fn pop(&self) -> Option<T> {
        loop {
            {
                let mut state = self.state.lock().await;
                match state.queue.pop_front() {
                    Some(Item::Token(key, item)) => {
                        if let Some(count) = state.pending_counts.get_mut(&key) {
                            *count = count.saturating_sub(1);
                        }
                        return Some(item);
                    }
                    Some(Item::Sentinel) => return None,
                    None => {}
                }
            }
            self.notify.notified().await;
        }
    }

    /// Posts `n` sentinels to unblock up to `n` waiting poppers.
    pub async fn close(&self, n: usize) {
        let mut state = self.state.lock().await;
        for _ in 0..n {
            state.queue.push_back(Item::Sentinel);
        }
        drop(state);
        self.notify.notify_waiters();
    }
}

pub type SharedWorkQueue<T> = Arc<WorkQueue<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_respects_per_reactor_cap() {
        let queue: WorkQueue<()> = WorkQueue::new(2);
        assert!(queue.push("r1", ()).await);
        assert!(queue.push("r1", ()).await);
        assert!(!queue.push("r1", ()).await);
        assert!(queue.push("r2", ()).await);
    }

    #[tokio::test]
    async fn pop_returns_tokens_fifo() {
        let queue: WorkQueue<u32> = WorkQueue::new(10);
        queue.push("r1", 1).await;
        queue.push("r2", 2).await;
        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, Some(2));
    }

    #[tokio::test]
    async fn close_unblocks_waiting_poppers() {
        let queue: Arc<WorkQueue<()>> = Arc::new(WorkQueue::new(10));
        let q2 = queue.clone();
        let popper = tokio::spawn(async move { q2.pop().await });
        queue.close(1).await;
        assert_eq!(popper.await.unwrap(), None);
    }

    #[tokio::test]
    async fn token_freed_after_pop_can_be_repushed() {
        let queue: WorkQueue<()> = WorkQueue::new(1);
        assert!(queue.push("r1", ()).await);
        assert!(!queue.push("r1", ()).await);
        queue.pop().await;
        assert!(queue.push("r1", ()).await);
    }
}
