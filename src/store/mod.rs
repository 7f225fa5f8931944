//! The message store: append, indexed query, claim/ack/release, consumer
//! group lifecycle, and worker-heartbeat-driven stale-claim reaping.
//!
//! [`Store`] is the trait any backend implements; [`memory::MemoryStore`]
//! is the reference in-process implementation that ships with the crate.

pub mod memory;
pub mod types;

pub use types::{Claim, ConsumerGroup, GroupStatus, Offset};

use crate::error::Result;
use crate::guard::{Condition, Guard};
use crate::message::{Message, Position};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait Store: Send + Sync {
    /// Append messages in one transaction, assigning monotonic positions.
    /// If `guard` is supplied, aborts with `ConcurrentAppend` when a
    /// matching message was written after `guard.last_position`. Empty
    /// input is a no-op that returns the current latest position.
    async fn append(&self, messages: Vec<Message>, guard: Option<Guard>) -> Result<Position>;

    /// Commits every `(messages, guard)` group as a single atomic unit: each
    /// guard is checked against the pre-batch state before anything is
    /// written, and one failing guard aborts the whole batch without
    /// persisting any of it. Used by the router to commit all of a
    /// reactor's append actions for one message together, so a later
    /// group's conflict can't leave an earlier group's messages stranded.
    ///
    /// The default implementation calls `append` once per group
    /// sequentially and is NOT atomic across groups; `MemoryStore`
    /// overrides it with a real all-or-nothing commit. A backend without
    /// cross-call transactions should override this too.
    async fn append_batch(&self, batches: Vec<(Vec<Message>, Option<Guard>)>) -> Result<Vec<Position>> {
        let mut positions = Vec::with_capacity(batches.len());
        for (messages, guard) in batches {
            positions.push(self.append(messages, guard).await?);
        }
        Ok(positions)
    }

    /// Messages matching any condition, ordered by position ascending,
    /// restricted to `position > from_position` and `len <= limit`.
    /// Returns a guard fencing exactly the returned set.
    async fn read(
        &self,
        conditions: &[Condition],
        from_position: Option<Position>,
        limit: Option<usize>,
    ) -> Result<(Vec<Message>, Guard)>;

    /// Same query as `read`, without a limit or guard — used internally to
    /// evaluate whether a guard's conditions were violated.
    async fn messages_since(&self, conditions: &[Condition], position: Position) -> Result<Vec<Message>>;

    /// Atomically bootstrap newly visible partitions, claim the one with
    /// the earliest pending work, and return up to `batch_size` of its
    /// pending messages. Returns `None` if the group is stopped or no
    /// unclaimed partition has pending work.
    #[allow(clippy::too_many_arguments)]
    async fn claim_next(
        &self,
        group_id: &str,
        partition_attrs: &[String],
        handled_types: &[String],
        worker_id: &str,
        batch_size: usize,
    ) -> Result<Option<Claim>>;

    /// Advance an offset's `last_position` and clear its claim.
    async fn ack(&self, group_id: &str, offset_id: &str, position: Position) -> Result<()>;

    /// Clear a claim without advancing `last_position`.
    async fn release(&self, group_id: &str, offset_id: &str) -> Result<()>;

    /// Idempotent insert with `status = active`.
    async fn register_consumer_group(&self, group_id: &str) -> Result<()>;

    async fn start_consumer_group(&self, group_id: &str) -> Result<()>;

    async fn stop_consumer_group(&self, group_id: &str) -> Result<()>;

    /// Delete all offsets for the group, causing a full replay.
    async fn reset_consumer_group(&self, group_id: &str) -> Result<()>;

    /// Record the most recent failure for a group, optionally scheduling a
    /// retry time (used by the error strategy).
    async fn set_group_error(
        &self,
        group_id: &str,
        error_context: serde_json::Value,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn worker_heartbeat(&self, worker_ids: &[String], at: Option<DateTime<Utc>>) -> Result<()>;

    /// Release claims held by workers not seen within `ttl_seconds`.
    /// Returns the number of claims released.
    async fn release_stale_claims(&self, ttl_seconds: i64) -> Result<usize>;

    async fn get_consumer_group(&self, group_id: &str) -> Result<Option<ConsumerGroup>>;
}
