//! Read-only reconciliation of staging keys against the destination.

use std::collections::BTreeSet;

use fieldsync_config::shared::FieldsyncConfig;
use metrics::gauge;
use serde::Serialize;
use tracing::info;

use crate::conflict::{ConflictDetector, ConflictOutcome};
use crate::error::SyncResult;
use crate::mapping::SnapshotSchema;
use crate::metrics::{FIELDSYNC_UNSYNCED_KEYS, PIPELINE_LABEL};
use crate::store::destination::DestinationStore;
use crate::store::staging::StagingStore;
use crate::types::{PageCursor, StatusFilter};

/// Result of a completeness audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    pub records_scanned: u64,
    /// Filtered staging records without a resolvable natural key.
    pub records_without_key: u64,
    pub staging_keys: u64,
    pub destination_keys: u64,
    /// Staging keys with no tagged destination entity.
    pub unsynced: u64,
    pub unsynced_sample: Vec<String>,
    /// Tagged destination keys no longer nominated by the staging filter.
    pub orphaned: u64,
    pub orphaned_sample: Vec<String>,
}

impl CompletenessReport {
    pub fn is_complete(&self) -> bool {
        self.unsynced == 0
    }
}

/// What a sync run would do with the keys that are still unsynced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingEstimate {
    pub unsynced: u64,
    pub would_sync: u64,
    pub conflicts: u64,
    pub conflict_sample: Vec<String>,
    /// Pages a full pass reads, at the configured page size.
    pub estimated_pages: u64,
    /// Runs needed under the configured page limit, [`None`] when unlimited.
    pub estimated_runs: Option<u64>,
}

struct StagingKeySet {
    keys: BTreeSet<String>,
    records_scanned: u64,
    records_without_key: u64,
}

/// Compares the key set nominated by the staging filter with the tagged destination keys.
#[derive(Debug, Clone)]
pub struct CompletenessAuditor<S, D> {
    staging: S,
    destination: D,
    schema: SnapshotSchema,
    filter: StatusFilter,
    pipeline: String,
    source_tag: String,
    page_size: usize,
    max_pages: Option<u64>,
    max_concurrent_lookups: usize,
}

impl<S, D> CompletenessAuditor<S, D>
where
    S: StagingStore,
    D: DestinationStore + Clone + Send + Sync,
{
    pub fn new(config: &FieldsyncConfig, staging: S, destination: D) -> Self {
        Self {
            staging,
            destination,
            schema: SnapshotSchema::new(config.mapping.snapshot.clone()),
            filter: StatusFilter::from(&config.sync.status_filter),
            pipeline: config.pipeline.name.clone(),
            source_tag: config.pipeline.source_tag.clone(),
            page_size: config.sync.page_size,
            max_pages: config.sync.max_pages,
            max_concurrent_lookups: config.sync.max_concurrent_lookups,
        }
    }

    /// Reports keys present on one side only, with sorted samples of up to `sample_size`.
    pub async fn audit(&self, sample_size: usize) -> SyncResult<CompletenessReport> {
        let staging = self.staging_keys().await?;
        let destination: BTreeSet<String> = self
            .destination
            .keys_by_source(&self.source_tag)
            .await?
            .into_iter()
            .collect();

        let unsynced: Vec<&String> = staging.keys.difference(&destination).collect();
        let orphaned: Vec<&String> = destination.difference(&staging.keys).collect();

        let report = CompletenessReport {
            records_scanned: staging.records_scanned,
            records_without_key: staging.records_without_key,
            staging_keys: staging.keys.len() as u64,
            destination_keys: destination.len() as u64,
            unsynced: unsynced.len() as u64,
            unsynced_sample: unsynced.iter().take(sample_size).map(|k| k.to_string()).collect(),
            orphaned: orphaned.len() as u64,
            orphaned_sample: orphaned.iter().take(sample_size).map(|k| k.to_string()).collect(),
        };

        gauge!(FIELDSYNC_UNSYNCED_KEYS, PIPELINE_LABEL => self.pipeline.clone())
            .set(report.unsynced as f64);
        info!(
            staging_keys = report.staging_keys,
            destination_keys = report.destination_keys,
            unsynced = report.unsynced,
            orphaned = report.orphaned,
            records_without_key = report.records_without_key,
            "completeness audit finished"
        );

        Ok(report)
    }

    /// Classifies every unsynced key the way the next sync run would.
    pub async fn estimate(&self, sample_size: usize) -> SyncResult<PendingEstimate> {
        let staging = self.staging_keys().await?;
        let destination: BTreeSet<String> = self
            .destination
            .keys_by_source(&self.source_tag)
            .await?
            .into_iter()
            .collect();
        let unsynced: Vec<String> = staging.keys.difference(&destination).cloned().collect();

        let detector = ConflictDetector::new(
            self.destination.clone(),
            self.source_tag.clone(),
            self.max_concurrent_lookups,
        );
        let outcomes = detector.classify_all(&unsynced).await?;

        let mut estimate = PendingEstimate {
            unsynced: unsynced.len() as u64,
            ..Default::default()
        };
        for (key, outcome) in unsynced.iter().zip(outcomes) {
            match outcome {
                ConflictOutcome::New => estimate.would_sync += 1,
                ConflictOutcome::PreExistingConflict { .. } => {
                    estimate.conflicts += 1;
                    if estimate.conflict_sample.len() < sample_size {
                        estimate.conflict_sample.push(key.clone());
                    }
                }
                ConflictOutcome::AlreadySynced => {}
            }
        }

        let page_size = self.page_size.max(1) as u64;
        estimate.estimated_pages = staging.records_scanned.div_ceil(page_size);
        estimate.estimated_runs = self
            .max_pages
            .filter(|max| *max > 0)
            .map(|max| estimate.estimated_pages.div_ceil(max));

        Ok(estimate)
    }

    async fn staging_keys(&self) -> SyncResult<StagingKeySet> {
        let mut set = StagingKeySet {
            keys: BTreeSet::new(),
            records_scanned: 0,
            records_without_key: 0,
        };
        let mut cursor: Option<PageCursor> = None;

        loop {
            let page = self
                .staging
                .fetch_page(&self.filter, cursor.as_ref(), self.page_size)
                .await?;

            for record in &page.records {
                set.records_scanned += 1;
                match self.schema.natural_key(record) {
                    Some(key) => {
                        set.keys.insert(key);
                    }
                    None => set.records_without_key += 1,
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(set)
    }
}
