use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::types::{ChangeEvent, DeadLetterRecord, SyncFailure};

/// The relational analytics warehouse fed by the mirror.
pub trait Warehouse {
    /// Appends `event` to the event log and upserts the current state projection.
    ///
    /// Applying an event twice has no further effect.
    fn apply_event(&self, event: &ChangeEvent) -> impl Future<Output = SyncResult<()>> + Send;

    /// Inserts or updates a failure keyed by its id.
    fn record_failure(&self, failure: &SyncFailure)
    -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns up to `limit` failures created after `created_after` with fewer than
    /// `max_attempts` retries, oldest first.
    fn retryable_failures(
        &self,
        created_after: DateTime<Utc>,
        max_attempts: u32,
        limit: usize,
    ) -> impl Future<Output = SyncResult<Vec<SyncFailure>>> + Send;

    fn remove_failure(&self, id: Uuid) -> impl Future<Output = SyncResult<()>> + Send;

    /// Moves `failure` to dead-letter storage and out of the retry queue.
    fn dead_letter(&self, failure: &SyncFailure) -> impl Future<Output = SyncResult<()>> + Send;

    fn failures(&self) -> impl Future<Output = SyncResult<Vec<SyncFailure>>> + Send;

    fn dead_letters(&self) -> impl Future<Output = SyncResult<Vec<DeadLetterRecord>>> + Send;

    fn event_count(&self) -> impl Future<Output = SyncResult<u64>> + Send;
}
