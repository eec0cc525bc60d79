//! Point in time status of a pipeline, its destination and the warehouse mirror.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::SyncResult;
use crate::mirror::Warehouse;
use crate::store::destination::DestinationStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub pipeline: String,
    pub source_tag: String,
    pub taken_at: DateTime<Utc>,
    pub entities: u64,
    /// Entities carrying this pipeline's source tag.
    pub tagged_entities: u64,
    pub history_entries: u64,
    pub checkpoint: Option<Checkpoint>,
    /// Present only when a warehouse is configured.
    pub mirror: Option<MirrorStatus>,
}

impl StatusSnapshot {
    /// Attaches the warehouse section.
    pub fn with_mirror(mut self, mirror: MirrorStatus) -> Self {
        self.mirror = Some(mirror);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorStatus {
    pub events: u64,
    pub pending_failures: u64,
    pub dead_letters: u64,
    pub oldest_pending_failure: Option<DateTime<Utc>>,
}

impl MirrorStatus {
    pub fn is_healthy(&self) -> bool {
        self.pending_failures == 0 && self.dead_letters == 0
    }
}

/// Collects [`StatusSnapshot`]s without writing anything.
#[derive(Debug, Clone)]
pub struct StatusMonitor<D, C> {
    destination: D,
    checkpoints: C,
    pipeline: String,
    source_tag: String,
}

impl<D, C> StatusMonitor<D, C>
where
    D: DestinationStore,
    C: CheckpointStore,
{
    pub fn new(
        destination: D,
        checkpoints: C,
        pipeline: impl Into<String>,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            destination,
            checkpoints,
            pipeline: pipeline.into(),
            source_tag: source_tag.into(),
        }
    }

    pub async fn snapshot(&self) -> SyncResult<StatusSnapshot> {
        let entities = self.destination.count_entities().await?;
        let tagged_entities = self.destination.keys_by_source(&self.source_tag).await?.len() as u64;
        let history_entries = self.destination.count_history_entries().await?;
        let checkpoint = self.checkpoints.load(&self.pipeline).await?;

        Ok(StatusSnapshot {
            pipeline: self.pipeline.clone(),
            source_tag: self.source_tag.clone(),
            taken_at: Utc::now(),
            entities,
            tagged_entities,
            history_entries,
            checkpoint,
            mirror: None,
        })
    }
}

/// Summarises the mirror event log and its failure queues.
pub async fn mirror_status<W>(warehouse: &W) -> SyncResult<MirrorStatus>
where
    W: Warehouse,
{
    let failures = warehouse.failures().await?;
    let dead_letters = warehouse.dead_letters().await?;

    Ok(MirrorStatus {
        events: warehouse.event_count().await?,
        pending_failures: failures.len() as u64,
        dead_letters: dead_letters.len() as u64,
        oldest_pending_failure: failures.iter().map(|f| f.created_at).min(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::mirror::MemoryWarehouse;
    use crate::store::destination::MemoryDestination;
    use crate::test_utils::fixtures::{change_event, document};
    use crate::types::SyncFailure;

    #[tokio::test]
    async fn snapshot_counts_tagged_entities_separately() {
        let destination = MemoryDestination::new();
        destination
            .insert_entity("P-1", document(json!({ "lastSyncedFrom": "vf-onemap-data" })))
            .await;
        destination
            .insert_entity("P-2", document(json!({ "lastSyncedFrom": "manual" })))
            .await;
        let checkpoints = MemoryCheckpointStore::new();
        checkpoints
            .save(&Checkpoint::new("onemap", "vf-onemap-data"))
            .await
            .unwrap();

        let monitor = StatusMonitor::new(destination, checkpoints, "onemap", "vf-onemap-data");
        let snapshot = monitor.snapshot().await.unwrap();

        assert_eq!(snapshot.entities, 2);
        assert_eq!(snapshot.tagged_entities, 1);
        assert_eq!(snapshot.history_entries, 0);
        assert!(snapshot.checkpoint.is_some_and(|c| c.is_running()));
        assert!(snapshot.mirror.is_none());
    }

    #[tokio::test]
    async fn mirror_status_reports_pending_failures() {
        let warehouse = MemoryWarehouse::new();
        let event = change_event("planned-poles", "P-1", document(json!({ "poleNumber": "P-1" })));
        warehouse.apply_event(&event).await.unwrap();
        let failure = SyncFailure::from_event(&event, "connection reset");
        warehouse.record_failure(&failure).await.unwrap();

        let status = mirror_status(&warehouse).await.unwrap();

        assert_eq!(status.events, 1);
        assert_eq!(status.pending_failures, 1);
        assert_eq!(status.oldest_pending_failure, Some(failure.created_at));
        assert!(!status.is_healthy());
    }
}
