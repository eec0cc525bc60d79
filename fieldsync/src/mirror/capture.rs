use chrono::Utc;
use fieldsync_config::shared::PipelineConfig;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::SyncResult;
use crate::store::destination::{DestinationStore, StoredHistoryEntry};
use crate::types::{ChangeEvent, ChangeOperation, Document, WriteBatch, WriteOp};

/// Receiving end of captured change events.
pub type EventReceiver = mpsc::UnboundedReceiver<ChangeEvent>;

/// Collection tags used for captured events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTags {
    pub entities: String,
    /// Tag of history entries, whose entity id is `<natural key>/<entry id>`.
    pub history: String,
}

impl CollectionTags {
    pub fn history_entity_id(natural_key: &str, entry_id: &str) -> String {
        format!("{natural_key}/{entry_id}")
    }

    /// Splits a history entity id into natural key and entry id.
    ///
    /// Entry ids are path safe, so the last `/` separates the two.
    pub fn split_history_entity_id(entity_id: &str) -> Option<(&str, &str)> {
        entity_id.rsplit_once('/')
    }
}

impl From<&PipelineConfig> for CollectionTags {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            entities: config.entity_collection.clone(),
            history: config.history_path(),
        }
    }
}

/// Destination wrapper that emits a [`ChangeEvent`] for every committed write.
///
/// Capture never fails or blocks a commit. If a state lookup around the commit fails,
/// the event is skipped with a warning.
#[derive(Debug, Clone)]
pub struct CapturingDestination<D> {
    inner: D,
    tags: CollectionTags,
    events_tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl<D> CapturingDestination<D>
where
    D: DestinationStore + Sync,
{
    pub fn wrap(inner: D, tags: CollectionTags) -> (Self, EventReceiver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        (
            Self {
                inner,
                tags,
                events_tx,
            },
            events_rx,
        )
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    async fn read_state(&self, op: &WriteOp) -> SyncResult<Option<Document>> {
        match op {
            WriteOp::UpsertEntity { natural_key, .. } => self.inner.get_entity(natural_key).await,
            WriteOp::UpsertHistory {
                natural_key,
                entry_id,
                ..
            } => Ok(self
                .inner
                .get_history_entry(natural_key, entry_id)
                .await?
                .map(|entry: StoredHistoryEntry| entry.document)),
        }
    }

    fn address(&self, op: &WriteOp) -> (String, String) {
        match op {
            WriteOp::UpsertEntity { natural_key, .. } => {
                (self.tags.entities.clone(), natural_key.clone())
            }
            WriteOp::UpsertHistory {
                natural_key,
                entry_id,
                ..
            } => (
                self.tags.history.clone(),
                CollectionTags::history_entity_id(natural_key, entry_id),
            ),
        }
    }

    async fn before_states(&self, batch: &WriteBatch) -> Vec<Option<Option<Document>>> {
        let mut states = Vec::with_capacity(batch.len());
        for op in batch.ops() {
            states.push(self.lookup(op).await);
        }
        states
    }

    async fn lookup(&self, op: &WriteOp) -> Option<Option<Document>> {
        match self.read_state(op).await {
            Ok(state) => Some(state),
            Err(err) => {
                let (collection, entity_id) = self.address(op);
                warn!(
                    error = %err,
                    collection = %collection,
                    entity_id = %entity_id,
                    "could not read state for change capture, skipping event"
                );
                None
            }
        }
    }
}

impl<D> DestinationStore for CapturingDestination<D>
where
    D: DestinationStore + Sync,
{
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get_entity(&self, natural_key: &str) -> SyncResult<Option<Document>> {
        self.inner.get_entity(natural_key).await
    }

    async fn keys_by_source(&self, source_tag: &str) -> SyncResult<Vec<String>> {
        self.inner.keys_by_source(source_tag).await
    }

    async fn count_entities(&self) -> SyncResult<u64> {
        self.inner.count_entities().await
    }

    async fn count_history_entries(&self) -> SyncResult<u64> {
        self.inner.count_history_entries().await
    }

    async fn history(&self, natural_key: &str) -> SyncResult<Vec<StoredHistoryEntry>> {
        self.inner.history(natural_key).await
    }

    async fn get_history_entry(
        &self,
        natural_key: &str,
        entry_id: &str,
    ) -> SyncResult<Option<StoredHistoryEntry>> {
        self.inner.get_history_entry(natural_key, entry_id).await
    }

    async fn commit(&self, batch: &WriteBatch) -> SyncResult<()> {
        let before = self.before_states(batch).await;
        self.inner.commit(batch).await?;

        let timestamp = Utc::now();
        for (op, before) in batch.ops().iter().zip(before) {
            let Some(before) = before else {
                continue;
            };
            let Some(after) = self.lookup(op).await else {
                continue;
            };

            let (collection, entity_id) = self.address(op);
            let operation = if before.is_some() {
                ChangeOperation::Update
            } else {
                ChangeOperation::Create
            };

            let event = ChangeEvent {
                collection,
                entity_id,
                operation,
                before,
                after,
                timestamp,
            };
            // The worker may have stopped; production writes go on regardless.
            if self.events_tx.send(event).is_err() {
                warn!("mirror worker is gone, change event dropped");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::destination::MemoryDestination;
    use crate::test_utils::fixtures::document;

    fn tags() -> CollectionTags {
        CollectionTags {
            entities: "planned-poles".to_string(),
            history: "planned-poles/statusHistory".to_string(),
        }
    }

    #[tokio::test]
    async fn emits_create_then_update_events() {
        let (destination, mut events) =
            CapturingDestination::wrap(MemoryDestination::new(), tags());
        let batch = WriteBatch::from(vec![
            WriteOp::UpsertHistory {
                natural_key: "P-1".to_string(),
                entry_id: "e1".to_string(),
                sequence: 0,
                document: document(json!({ "toStatus": "Requested" })),
            },
            WriteOp::UpsertEntity {
                natural_key: "P-1".to_string(),
                document: document(json!({ "currentStatus": "Requested" })),
            },
        ]);

        destination.commit(&batch).await.unwrap();
        destination.commit(&batch).await.unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.collection, "planned-poles/statusHistory");
        assert_eq!(first.entity_id, "P-1/e1");
        assert_eq!(first.operation, ChangeOperation::Create);

        let second = events.recv().await.unwrap();
        assert_eq!(second.collection, "planned-poles");
        assert_eq!(second.operation, ChangeOperation::Create);
        assert!(second.before.is_none());

        let third = events.recv().await.unwrap();
        assert_eq!(third.operation, ChangeOperation::Update);
        assert_eq!(third.before, third.after);
    }

    #[test]
    fn history_entity_ids_round_trip() {
        let id = CollectionTags::history_entity_id("P/7", "2025-01-01_0_Requested");

        assert_eq!(
            CollectionTags::split_history_entity_id(&id),
            Some(("P/7", "2025-01-01_0_Requested"))
        );
    }
}
