//! In-process reference [`Store`] implementation.
//!
//! Backed by a single `parking_lot::Mutex`-guarded state blob so that every
//! multi-step write (append-with-guard, append_batch, claim_next) is atomic
//! without needing a real transactional backend. Mirrors the shape of an
//! in-memory event store that keeps indices alongside the log itself rather
//! than recomputing them per query.

use super::types::{Claim, ConsumerGroup, GroupStatus, Offset};
use super::Store;
use crate::clock::{Clock, SystemClock};
use crate::error::{EventlineError, Result};
use crate::guard::{Condition, Guard};
use crate::message::{Message, Position};
use crate::notifier::{InlineNotifier, Notification, Notifier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
struct StoreInner {
    messages: Vec<Message>,
    /// `(key_name, key_value) -> positions of messages exposing that pair`,
    /// maintained alongside the log so condition lookups don't rescan it.
    key_index: HashMap<(String, String), Vec<Position>>,
    consumer_groups: HashMap<String, ConsumerGroup>,
    offsets: HashMap<String, Offset>,
    offset_by_group_partition: HashMap<(String, String), String>,
    worker_last_seen: HashMap<String, DateTime<Utc>>,
}

impl StoreInner {
    fn latest_position(&self) -> Position {
        self.messages.last().and_then(|m| m.position).unwrap_or(0)
    }

    fn matches_any(&self, message: &Message, conditions: &[Condition]) -> bool {
        let keys = message.extracted_keys();
        conditions.iter().any(|c| {
            message.message_type == c.message_type
                && keys
                    .iter()
                    .any(|(name, value)| *name == c.key_name && *value == c.key_value)
        })
    }

    fn messages_matching(&self, conditions: &[Condition], after: Position) -> Vec<Message> {
        let mut out: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| m.position.unwrap_or(0) > after && self.matches_any(m, conditions))
            .collect();
        out.sort_by_key(|m| m.position.unwrap_or(0));
        out.into_iter().cloned().collect()
    }

    fn check_guard(&self, guard: &Guard) -> Result<()> {
        let conflicts = self.messages_matching(&guard.conditions, guard.last_position);
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(EventlineError::ConcurrentAppend(format!(
                "{} conflicting message(s) observed after position {}",
                conflicts.len(),
                guard.last_position
            )))
        }
    }

    /// Appends one group's messages, assigning positions, and records every
    /// distinct message type touched into `distinct_types`. Assumes guards
    /// have already been checked for the whole batch this group belongs to.
    fn commit(&mut self, messages: Vec<Message>, distinct_types: &mut Vec<String>) -> Position {
        let mut next_position = self.latest_position();
        for mut message in messages {
            next_position += 1;
            message.position = Some(next_position);
            for (name, value) in message.extracted_keys() {
                self.key_index.entry((name, value)).or_default().push(next_position);
            }
            if !distinct_types.contains(&message.message_type) {
                distinct_types.push(message.message_type.clone());
            }
            self.messages.push(message);
        }
        next_position
    }
}

pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            notifier: Arc::new(InlineNotifier::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            notifier,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_notifier_and_clock(notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            notifier,
            clock,
        }
    }

    fn partition_key_for(attrs: &[String], value: &HashMap<String, String>) -> String {
        attrs
            .iter()
            .map(|a| format!("{}={}", a, value.get(a).map(|s| s.as_str()).unwrap_or("")))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn append(&self, messages: Vec<Message>, guard: Option<Guard>) -> Result<Position> {
        Ok(self
            .append_batch(vec![(messages, guard)])
            .await?
            .pop()
            .expect("append_batch returns one position per input group"))
    }

    async fn append_batch(&self, batches: Vec<(Vec<Message>, Option<Guard>)>) -> Result<Vec<Position>> {
        if batches.is_empty() {
            return Ok(Vec::new());
        }

        let (positions, distinct_types) = {
            let mut inner = self.inner.lock();

            // Check every group's guard against the pre-batch state before
            // committing anything, so one group's conflict can't leave an
            // earlier group's messages already written.
            for (_, guard) in &batches {
                if let Some(guard) = guard {
                    if let Err(err) = inner.check_guard(guard) {
                        return Err(err);
                    }
                }
            }

            let mut positions = Vec::with_capacity(batches.len());
            let mut distinct_types: Vec<String> = Vec::new();
            for (messages, _) in batches {
                if messages.is_empty() {
                    positions.push(inner.latest_position());
                    continue;
                }
                positions.push(inner.commit(messages, &mut distinct_types));
            }
            (positions, distinct_types)
        };

        if !distinct_types.is_empty() {
            self.notifier
                .notify(Notification::MessagesAppended {
                    types: distinct_types,
                })
                .await;
        }

        Ok(positions)
    }

    async fn read(
        &self,
        conditions: &[Condition],
        from_position: Option<Position>,
        limit: Option<usize>,
    ) -> Result<(Vec<Message>, Guard)> {
        let inner = self.inner.lock();
        let from = from_position.unwrap_or(0);
        let mut matching = inner.messages_matching(conditions, from);
        if let Some(limit) = limit {
            matching.truncate(limit);
        }
        let last_position = matching
            .last()
            .and_then(|m| m.position)
            .unwrap_or_else(|| from.max(inner.latest_position()));
        Ok((
            matching,
            Guard::new(conditions.to_vec(), last_position),
        ))
    }

    async fn messages_since(&self, conditions: &[Condition], position: Position) -> Result<Vec<Message>> {
        Ok(self.inner.lock().messages_matching(conditions, position))
    }

    async fn claim_next(
        &self,
        group_id: &str,
        partition_attrs: &[String],
        handled_types: &[String],
        worker_id: &str,
        batch_size: usize,
    ) -> Result<Option<Claim>> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();

        match inner.consumer_groups.get(group_id) {
            Some(group) if !group.is_claimable(now) => return Ok(None),
            None => return Ok(None),
            _ => {}
        }

        // Step 1: bootstrap any partition newly visible to this group.
        let mut newly_visible: Vec<HashMap<String, String>> = Vec::new();
        for message in &inner.messages {
            if !handled_types.contains(&message.message_type) {
                continue;
            }
            if !message.declares_all(partition_attrs) {
                continue;
            }
            let keys = message.extracted_keys();
            let value: HashMap<String, String> = partition_attrs
                .iter()
                .filter_map(|attr| {
                    keys.iter()
                        .find(|(name, _)| name == attr)
                        .map(|(_, v)| (attr.clone(), v.clone()))
                })
                .collect();
            let partition_key = Self::partition_key_for(partition_attrs, &value);
            if !inner
                .offset_by_group_partition
                .contains_key(&(group_id.to_string(), partition_key.clone()))
                && !newly_visible
                    .iter()
                    .any(|v| Self::partition_key_for(partition_attrs, v) == partition_key)
            {
                newly_visible.push(value);
            }
        }
        for value in newly_visible {
            let partition_key = Self::partition_key_for(partition_attrs, &value);
            let offset_id = Uuid::new_v4().to_string();
            let offset = Offset::new(offset_id.clone(), group_id, partition_key.clone(), value);
            inner.offsets.insert(offset_id.clone(), offset);
            inner
                .offset_by_group_partition
                .insert((group_id.to_string(), partition_key), offset_id);
        }

        // Step 2: find the unclaimed offset whose earliest pending message
        // has the lowest position across the whole group.
        let declared_attrs_by_type = Self::declared_attrs_by_type(&inner.messages, handled_types, partition_attrs);

        let mut best: Option<(String, Position)> = None;
        for offset in inner.offsets.values() {
            if offset.group_id != group_id || offset.claimed {
                continue;
            }
            if let Some(pending_pos) = Self::earliest_pending(
                &inner.messages,
                handled_types,
                &offset.partition_value,
                offset.last_position,
            ) {
                if best.as_ref().map(|(_, p)| pending_pos < *p).unwrap_or(true) {
                    best = Some((offset.id.clone(), pending_pos));
                }
            }
        }

        let Some((offset_id, _)) = best else {
            return Ok(None);
        };

        // Step 3: claim it.
        let offset = inner.offsets.get_mut(&offset_id).unwrap();
        offset.claimed = true;
        offset.claimed_by = Some(worker_id.to_string());
        offset.claimed_at = Some(now);
        let offset_snapshot = offset.clone();

        // Step 4: read up to batch_size pending messages for the partition.
        let messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| {
                handled_types.contains(&m.message_type)
                    && m.position.unwrap_or(0) > offset_snapshot.last_position
                    && Self::matches_partition(m, &offset_snapshot.partition_value)
            })
            .take(batch_size)
            .cloned()
            .collect();

        let max_matching_position = inner
            .messages
            .iter()
            .filter(|m| {
                handled_types.contains(&m.message_type)
                    && Self::matches_partition(m, &offset_snapshot.partition_value)
            })
            .map(|m| m.position.unwrap_or(0))
            .max()
            .unwrap_or(0);

        let replaying = offset_snapshot.last_position < max_matching_position
            && messages.last().and_then(|m| m.position).unwrap_or(0) < max_matching_position;

        let guard_last_position = messages
            .last()
            .and_then(|m| m.position)
            .unwrap_or(offset_snapshot.last_position);

        let mut conditions = Vec::new();
        for t in handled_types {
            if let Some(attrs) = declared_attrs_by_type.get(t) {
                for attr in attrs {
                    if let Some(value) = offset_snapshot.partition_value.get(attr) {
                        conditions.push(Condition::new(t.clone(), attr.clone(), value.clone()));
                    }
                }
            }
        }

        Ok(Some(Claim {
            offset_id: offset_snapshot.id,
            group_id: group_id.to_string(),
            partition_key: offset_snapshot.partition_key,
            partition_value: offset_snapshot.partition_value,
            messages,
            replaying,
            guard: Guard::new(conditions, guard_last_position),
        }))
    }

    async fn ack(&self, group_id: &str, offset_id: &str, position: Position) -> Result<()> {
        let mut inner = self.inner.lock();
        let offset = inner
            .offsets
            .get_mut(offset_id)
            .filter(|o| o.group_id == group_id)
            .ok_or_else(|| EventlineError::OffsetNotFound(offset_id.to_string()))?;
        offset.last_position = position;
        offset.claimed = false;
        offset.claimed_by = None;
        offset.claimed_at = None;
        Ok(())
    }

    async fn release(&self, group_id: &str, offset_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let offset = inner
            .offsets
            .get_mut(offset_id)
            .filter(|o| o.group_id == group_id)
            .ok_or_else(|| EventlineError::OffsetNotFound(offset_id.to_string()))?;
        offset.claimed = false;
        offset.claimed_by = None;
        offset.claimed_at = None;
        Ok(())
    }

    async fn register_consumer_group(&self, group_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        inner
            .consumer_groups
            .entry(group_id.to_string())
            .or_insert_with(|| ConsumerGroup::new(group_id, now));
        Ok(())
    }

    async fn start_consumer_group(&self, group_id: &str) -> Result<()> {
        let was_stopped = {
            let mut inner = self.inner.lock();
            let now = self.clock.now();
            let group = inner
                .consumer_groups
                .get_mut(group_id)
                .ok_or_else(|| EventlineError::GroupNotFound(group_id.to_string()))?;
            let was_stopped = matches!(group.status, GroupStatus::Stopped);
            group.status = GroupStatus::Active;
            group.retry_at = None;
            group.updated_at = now;
            was_stopped
        };
        if was_stopped {
            self.notifier
                .notify(Notification::ReactorResumed {
                    group_id: group_id.to_string(),
                })
                .await;
        }
        Ok(())
    }

    async fn stop_consumer_group(&self, group_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        let group = inner
            .consumer_groups
            .get_mut(group_id)
            .ok_or_else(|| EventlineError::GroupNotFound(group_id.to_string()))?;
        group.status = GroupStatus::Stopped;
        group.updated_at = now;
        Ok(())
    }

    async fn reset_consumer_group(&self, group_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let to_remove: Vec<String> = inner
            .offsets
            .values()
            .filter(|o| o.group_id == group_id)
            .map(|o| o.id.clone())
            .collect();
        for id in to_remove {
            inner.offsets.remove(&id);
        }
        inner
            .offset_by_group_partition
            .retain(|(g, _), _| g != group_id);
        Ok(())
    }

    async fn set_group_error(
        &self,
        group_id: &str,
        error_context: serde_json::Value,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        let group = inner
            .consumer_groups
            .get_mut(group_id)
            .ok_or_else(|| EventlineError::GroupNotFound(group_id.to_string()))?;
        group.error_context = Some(error_context);
        group.retry_at = retry_at;
        group.updated_at = now;
        Ok(())
    }

    async fn worker_heartbeat(&self, worker_ids: &[String], at: Option<DateTime<Utc>>) -> Result<()> {
        let mut inner = self.inner.lock();
        let now = at.unwrap_or_else(|| self.clock.now());
        for id in worker_ids {
            inner.worker_last_seen.insert(id.clone(), now);
        }
        Ok(())
    }

    async fn release_stale_claims(&self, ttl_seconds: i64) -> Result<usize> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        let cutoff = now - chrono::Duration::seconds(ttl_seconds);

        let stale_workers: HashSet<String> = inner
            .worker_last_seen
            .iter()
            .filter(|(_, last_seen)| **last_seen < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        let mut released = 0usize;
        for offset in inner.offsets.values_mut() {
            let is_stale = offset
                .claimed_by
                .as_ref()
                .map(|w| stale_workers.contains(w))
                .unwrap_or(false);
            if offset.claimed && is_stale {
                offset.claimed = false;
                offset.claimed_by = None;
                offset.claimed_at = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn get_consumer_group(&self, group_id: &str) -> Result<Option<ConsumerGroup>> {
        Ok(self.inner.lock().consumer_groups.get(group_id).cloned())
    }
}

impl MemoryStore {
    fn matches_partition(message: &Message, partition_value: &HashMap<String, String>) -> bool {
        let keys = message.extracted_keys();
        partition_value.iter().all(|(attr, value)| {
            keys.iter()
                .find(|(name, _)| name == attr)
                .map(|(_, v)| v == value)
                .unwrap_or(true) // not declared by this message: don't-care
        })
    }

    fn earliest_pending(
        messages: &[Message],
        handled_types: &[String],
        partition_value: &HashMap<String, String>,
        after: Position,
    ) -> Option<Position> {
        messages
            .iter()
            .filter(|m| {
                handled_types.contains(&m.message_type)
                    && m.position.unwrap_or(0) > after
                    && Self::matches_partition(m, partition_value)
            })
            .map(|m| m.position.unwrap_or(0))
            .min()
    }

    /// For each handled type, the union of partition attributes any message
    /// of that type has ever declared. A claim's guard conditions are built
    /// from this, not a static schema, since declared attributes are
    /// whatever the messages actually carried.
    fn declared_attrs_by_type(
        messages: &[Message],
        handled_types: &[String],
        partition_attrs: &[String],
    ) -> HashMap<String, HashSet<String>> {
        let mut out: HashMap<String, HashSet<String>> = HashMap::new();
        for message in messages {
            if !handled_types.contains(&message.message_type) {
                continue;
            }
            let entry = out.entry(message.message_type.clone()).or_default();
            let keys = message.extracted_keys();
            for attr in partition_attrs {
                if keys.iter().any(|(name, _)| name == attr) {
                    entry.insert(attr.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(t: &str, payload: serde_json::Value) -> Message {
        Message::builder(t, payload).build()
    }

    #[tokio::test]
    async fn append_assigns_monotonic_positions() {
        let store = MemoryStore::new();
        let p1 = store
            .append(vec![msg("orders.created", json!({"order_id": "O1"}))], None)
            .await
            .unwrap();
        let p2 = store
            .append(vec![msg("orders.created", json!({"order_id": "O2"}))], None)
            .await
            .unwrap();
        assert!(p2 > p1);
    }

    #[tokio::test]
    async fn empty_append_is_a_noop() {
        let store = MemoryStore::new();
        store
            .append(vec![msg("orders.created", json!({"order_id": "O1"}))], None)
            .await
            .unwrap();
        let p = store.append(vec![], None).await.unwrap();
        assert_eq!(p, 1);
    }

    #[tokio::test]
    async fn read_round_trips_a_single_message() {
        let store = MemoryStore::new();
        store
            .append(vec![msg("orders.created", json!({"order_id": "O1", "total": 42}))], None)
            .await
            .unwrap();
        let conditions = vec![Condition::new("orders.created", "order_id", "O1")];
        let (messages, guard) = store.read(&conditions, None, None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(guard.last_position, messages[0].position.unwrap());
    }

    #[tokio::test]
    async fn guard_conflict_on_overlapping_condition() {
        let store = MemoryStore::new();
        store
            .append(vec![msg("orders.created", json!({"order_id": "O1"}))], None)
            .await
            .unwrap();
        let conditions = vec![Condition::new("orders.created", "order_id", "O1")];
        let (_, guard) = store.read(&conditions, None, None).await.unwrap();

        // A concurrent writer appends into the same condition set.
        store
            .append(vec![msg("orders.created", json!({"order_id": "O1"}))], None)
            .await
            .unwrap();

        let result = store
            .append(vec![msg("orders.updated", json!({"order_id": "O1"}))], Some(guard))
            .await;
        assert!(matches!(result, Err(EventlineError::ConcurrentAppend(_))));
    }

    #[tokio::test]
    async fn guard_does_not_conflict_on_unrelated_partition() {
        let store = MemoryStore::new();
        store
            .append(vec![msg("orders.created", json!({"order_id": "O1"}))], None)
            .await
            .unwrap();
        let conditions = vec![Condition::new("orders.created", "order_id", "O1")];
        let (_, guard) = store.read(&conditions, None, None).await.unwrap();

        store
            .append(vec![msg("orders.created", json!({"order_id": "O2"}))], None)
            .await
            .unwrap();

        let result = store
            .append(vec![msg("orders.updated", json!({"order_id": "O1"}))], Some(guard))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn claim_next_bootstraps_and_claims_a_partition() {
        let store = MemoryStore::new();
        store.register_consumer_group("orders-projector").await.unwrap();
        store
            .append(vec![msg("orders.created", json!({"order_id": "O1"}))], None)
            .await
            .unwrap();

        let claim = store
            .claim_next(
                "orders-projector",
                &["order_id".to_string()],
                &["orders.created".to_string()],
                "w1",
                10,
            )
            .await
            .unwrap()
            .expect("claim");
        assert_eq!(claim.messages.len(), 1);
        assert!(!claim.replaying);
    }

    #[tokio::test]
    async fn claimed_partition_is_not_claimable_twice() {
        let store = MemoryStore::new();
        store.register_consumer_group("g").await.unwrap();
        store
            .append(vec![msg("orders.created", json!({"order_id": "O1"}))], None)
            .await
            .unwrap();

        let attrs = vec!["order_id".to_string()];
        let types = vec!["orders.created".to_string()];
        let first = store.claim_next("g", &attrs, &types, "w1", 10).await.unwrap();
        assert!(first.is_some());
        let second = store.claim_next("g", &attrs, &types, "w2", 10).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn ack_advances_offset_and_clears_claim() {
        let store = MemoryStore::new();
        store.register_consumer_group("g").await.unwrap();
        store
            .append(vec![msg("orders.created", json!({"order_id": "O1"}))], None)
            .await
            .unwrap();
        let attrs = vec!["order_id".to_string()];
        let types = vec!["orders.created".to_string()];
        let claim = store
            .claim_next("g", &attrs, &types, "w1", 10)
            .await
            .unwrap()
            .unwrap();
        let last_position = claim.messages.last().unwrap().position.unwrap();
        store.ack("g", &claim.offset_id, last_position).await.unwrap();

        // Re-claimable now that it is unclaimed, but no new pending work.
        let next = store.claim_next("g", &attrs, &types, "w2", 10).await.unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn stale_claim_is_released_after_ttl() {
        let clock = Arc::new(crate::clock::FixedClock::new(Utc::now()));
        let store = MemoryStore::with_notifier_and_clock(Arc::new(InlineNotifier::new()), clock.clone());
        store.register_consumer_group("g").await.unwrap();
        store
            .append(vec![msg("orders.created", json!({"order_id": "O1"}))], None)
            .await
            .unwrap();
        let attrs = vec!["order_id".to_string()];
        let types = vec!["orders.created".to_string()];
        store.claim_next("g", &attrs, &types, "w1", 10).await.unwrap();
        store
            .worker_heartbeat(&["w1".to_string()], None)
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(120));
        let released = store.release_stale_claims(60).await.unwrap();
        assert_eq!(released, 1);

        let reclaimed = store.claim_next("g", &attrs, &types, "w2", 10).await.unwrap();
        assert!(reclaimed.is_some());
    }
}
