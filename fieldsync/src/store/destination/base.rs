use std::future::Future;

use crate::error::SyncResult;
use crate::types::{Document, WriteBatch};

/// A history entry as read back from the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHistoryEntry {
    pub entry_id: String,
    pub sequence: u32,
    pub document: Document,
}

/// The production document store.
///
/// Entities are keyed by natural key and never deleted by the pipeline. History entries
/// live in a sub-collection scoped to their entity.
pub trait DestinationStore {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn get_entity(&self, natural_key: &str)
    -> impl Future<Output = SyncResult<Option<Document>>> + Send;

    /// Returns the sorted keys of entities whose `lastSyncedFrom` equals `source_tag`.
    fn keys_by_source(
        &self,
        source_tag: &str,
    ) -> impl Future<Output = SyncResult<Vec<String>>> + Send;

    fn count_entities(&self) -> impl Future<Output = SyncResult<u64>> + Send;

    fn count_history_entries(&self) -> impl Future<Output = SyncResult<u64>> + Send;

    /// Returns the history of `natural_key` ordered by sequence.
    fn history(
        &self,
        natural_key: &str,
    ) -> impl Future<Output = SyncResult<Vec<StoredHistoryEntry>>> + Send;

    fn get_history_entry(
        &self,
        natural_key: &str,
        entry_id: &str,
    ) -> impl Future<Output = SyncResult<Option<StoredHistoryEntry>>> + Send;

    /// Applies every operation in `batch` atomically with deep merge semantics.
    fn commit(&self, batch: &WriteBatch) -> impl Future<Output = SyncResult<()>> + Send;
}
