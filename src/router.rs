//! The router: claims one batch for one reactor, runs it, and commits
//! actions plus the ack atomically.

use crate::error::{EventlineError, Result};
use crate::error_strategy::{ErrorStrategy, StopImmediately};
use crate::guard::Guard;
use crate::message::Message;
use crate::reactor::{Action, GroupProxy, History, Reactor};
use crate::store::Store;
use std::sync::Arc;

pub struct Router {
    store: Arc<dyn Store>,
    default_error_strategy: Arc<dyn ErrorStrategy>,
}

impl Router {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_default_error_strategy(store, Arc::new(StopImmediately))
    }

    /// `default_error_strategy` handles exceptions from any reactor that
    /// wasn't built with its own `with_error_strategy` override.
    pub fn with_default_error_strategy(store: Arc<dyn Store>, default_error_strategy: Arc<dyn ErrorStrategy>) -> Self {
        Self {
            store,
            default_error_strategy,
        }
    }

    fn error_strategy_for(&self, reactor: &Arc<dyn Reactor>) -> Arc<dyn ErrorStrategy> {
        reactor
            .error_strategy_override()
            .unwrap_or_else(|| self.default_error_strategy.clone())
    }

    /// Claims and processes one batch for `reactor`. Returns `false` if
    /// there was no work to do; `true` if work was attempted, regardless of
    /// whether it ultimately succeeded (a `ConcurrentAppend` or any other
    /// exception still counts as "work attempted").
    pub async fn handle_next_for(
        &self,
        reactor: &Arc<dyn Reactor>,
        worker_id: &str,
        batch_size: usize,
    ) -> Result<bool> {
        let claim = self
            .store
            .claim_next(
                reactor.group_id(),
                reactor.partition_attrs(),
                reactor.handled_messages(),
                worker_id,
                batch_size,
            )
            .await?;

        let Some(claim) = claim else {
            return Ok(false);
        };

        let history = if reactor.needs_history() {
            let conditions = reactor.context_for(&claim.partition_value);
            let (messages, guard) = self.store.read(&conditions, None, None).await?;
            Some(History { messages, guard })
        } else {
            None
        };

        let group = GroupProxy::new(self.store.clone(), reactor.group_id());

        let pairs = match reactor.handle_batch(&claim, history.as_ref()).await {
            Ok(pairs) => pairs,
            Err(EventlineError::ConcurrentAppend(_)) => {
                self.store.release(&claim.group_id, &claim.offset_id).await?;
                return Ok(true);
            }
            Err(err) => {
                self.store.release(&claim.group_id, &claim.offset_id).await?;
                let reference = claim.messages.first().cloned();
                if let Some(message) = reference {
                    self.error_strategy_for(reactor).handle(&err, &message, &group).await;
                }
                return Ok(true);
            }
        };

        let last_index = pairs.len().checked_sub(1);
        for (index, (actions, source)) in pairs.into_iter().enumerate() {
            if let Err(err) = self.run_actions(actions).await {
                self.store.release(&claim.group_id, &claim.offset_id).await?;
                match &err {
                    EventlineError::ConcurrentAppend(_) => return Ok(true),
                    _ => {
                        self.error_strategy_for(reactor).handle(&err, &source, &group).await;
                        return Ok(true);
                    }
                }
            }
            if Some(index) == last_index {
                if let Some(position) = source.position {
                    self.store.ack(&claim.group_id, &claim.offset_id, position).await?;
                }
            }
        }

        Ok(true)
    }

    /// Runs every `Sync` closure first, then commits all `Append`/`Schedule`
    /// groups as one atomic batch. A failing `Sync` returns before any
    /// message in the pair is persisted; the store's own batch commit
    /// similarly refuses to write any group if another group's guard
    /// conflicts, so the whole pair succeeds or fails together.
    async fn run_actions(&self, actions: Vec<Action>) -> Result<()> {
        let mut append_groups: Vec<(Vec<Message>, Option<Guard>)> = Vec::new();
        for action in actions {
            match action {
                Action::Ok => {}
                Action::Append(messages, guard) => append_groups.push((messages, guard)),
                Action::Schedule(messages, at) => {
                    let scheduled: Vec<_> = messages
                        .into_iter()
                        .map(|mut m| {
                            m.created_at = at;
                            m
                        })
                        .collect();
                    append_groups.push((scheduled, None));
                }
                Action::Sync(f) => {
                    f()?;
                }
            }
        }
        if !append_groups.is_empty() {
            self.store.append_batch(append_groups).await?;
        }
        Ok(())
    }

    /// Loops over every registered reactor, calling `handle_next_for`,
    /// until all return `false`. The synchronous "drain everything now"
    /// path for host callers that bypass the dispatcher.
    pub async fn drain(&self, reactors: &[Arc<dyn Reactor>], worker_id: &str, batch_size: usize) -> Result<()> {
        loop {
            let mut any_worked = false;
            for reactor in reactors {
                if self.handle_next_for(reactor, worker_id, batch_size).await? {
                    any_worked = true;
                }
            }
            if !any_worked {
                return Ok(());
            }
        }
    }
}
