use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::SyncResult;
use crate::store::destination::{DestinationStore, StoredHistoryEntry};
use crate::types::{Document, WriteBatch, WriteOp, deep_merge};

#[derive(Debug, Default)]
struct Inner {
    entities: BTreeMap<String, Document>,
    /// History per natural key, keyed by entry id.
    history: HashMap<String, BTreeMap<String, StoredHistoryEntry>>,
}

/// In-memory destination store.
///
/// Commits hold the lock for the whole batch, which makes them atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entity as is, bypassing the commit path.
    ///
    /// Models documents created by other writers.
    pub async fn insert_entity(&self, natural_key: impl Into<String>, document: Document) {
        let mut inner = self.inner.lock().await;
        inner.entities.insert(natural_key.into(), document);
    }

    /// Returns a copy of every entity, sorted by key.
    pub async fn entities(&self) -> BTreeMap<String, Document> {
        self.inner.lock().await.entities.clone()
    }
}

impl DestinationStore for MemoryDestination {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_entity(&self, natural_key: &str) -> SyncResult<Option<Document>> {
        let inner = self.inner.lock().await;

        Ok(inner.entities.get(natural_key).cloned())
    }

    async fn keys_by_source(&self, source_tag: &str) -> SyncResult<Vec<String>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .entities
            .iter()
            .filter(|(_, document)| {
                document.get("lastSyncedFrom").and_then(|v| v.as_str()) == Some(source_tag)
            })
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn count_entities(&self) -> SyncResult<u64> {
        Ok(self.inner.lock().await.entities.len() as u64)
    }

    async fn count_history_entries(&self) -> SyncResult<u64> {
        let inner = self.inner.lock().await;

        Ok(inner.history.values().map(|entries| entries.len() as u64).sum())
    }

    async fn history(&self, natural_key: &str) -> SyncResult<Vec<StoredHistoryEntry>> {
        let inner = self.inner.lock().await;

        let mut entries: Vec<StoredHistoryEntry> = inner
            .history
            .get(natural_key)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| {
            a.sequence
                .cmp(&b.sequence)
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });

        Ok(entries)
    }

    async fn get_history_entry(
        &self,
        natural_key: &str,
        entry_id: &str,
    ) -> SyncResult<Option<StoredHistoryEntry>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .history
            .get(natural_key)
            .and_then(|entries| entries.get(entry_id))
            .cloned())
    }

    async fn commit(&self, batch: &WriteBatch) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        for op in batch.ops() {
            match op.clone() {
                WriteOp::UpsertEntity {
                    natural_key,
                    document,
                } => {
                    let target = inner.entities.entry(natural_key).or_default();
                    deep_merge(target, document);
                }
                WriteOp::UpsertHistory {
                    natural_key,
                    entry_id,
                    sequence,
                    document,
                } => {
                    let entry = inner
                        .history
                        .entry(natural_key)
                        .or_default()
                        .entry(entry_id.clone())
                        .or_insert_with(|| StoredHistoryEntry {
                            entry_id,
                            sequence,
                            document: Document::new(),
                        });
                    entry.sequence = sequence;
                    deep_merge(&mut entry.document, document);
                }
            }
        }

        Ok(())
    }
}
