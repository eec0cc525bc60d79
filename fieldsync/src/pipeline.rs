//! The sync run: pages through staging and commits entities with their history.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fieldsync_config::shared::{FieldsyncConfig, SyncConfig};
use metrics::counter;
use tracing::{info, warn};

use crate::checkpoint::{CheckpointManager, CheckpointStore, UnprocessedBatch};
use crate::commit::{BatchCommitCoordinator, plan_batches};
use crate::concurrency::fanout::try_fan_out;
use crate::conflict::{ConflictDetector, ConflictOutcome};
use crate::entity::EntityBuilder;
use crate::error::{ErrorKind, SyncResult};
use crate::mapping::{MappingIssue, SnapshotSchema};
use crate::metrics::{
    FIELDSYNC_KEYS_TOTAL, FIELDSYNC_PAGES_COMPLETED_TOTAL, FIELDSYNC_SNAPSHOTS_READ_TOTAL,
    OUTCOME_LABEL, PIPELINE_LABEL,
};
use crate::report::{KeyOutcome, Outcome, RunReport, RunTotals, StopReason};
use crate::store::destination::DestinationStore;
use crate::store::staging::StagingStore;
use crate::types::{RawSnapshot, StatusFilter};

/// Per-invocation limits of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop after this many pages.
    pub max_pages: Option<u64>,
    /// Do not start another page once this much time has passed.
    pub max_runtime: Option<Duration>,
    /// Classify and plan without writing anything.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            max_runtime: config.max_runtime_secs.map(Duration::from_secs),
            dry_run: false,
        }
    }
}

/// A candidate key with its destination classification and full snapshot set.
#[derive(Debug)]
struct PreparedKey {
    natural_key: String,
    outcome: ConflictOutcome,
    snapshots: Vec<RawSnapshot>,
}

/// Accumulates outcomes and totals of one run.
#[derive(Debug)]
struct RunLedger {
    pipeline: String,
    totals: RunTotals,
    outcomes: Vec<KeyOutcome>,
}

impl RunLedger {
    fn record(&mut self, natural_key: impl Into<String>, outcome: Outcome, detail: String) {
        counter!(
            FIELDSYNC_KEYS_TOTAL,
            PIPELINE_LABEL => self.pipeline.clone(),
            OUTCOME_LABEL => outcome.as_str()
        )
        .increment(1);

        match outcome {
            Outcome::Synced | Outcome::WouldSync => self.totals.keys_synced += 1,
            Outcome::AlreadySynced => self.totals.already_synced += 1,
            Outcome::Conflict => self.totals.conflicts += 1,
            Outcome::MissingKey => self.totals.missing_keys += 1,
            Outcome::MappingError => self.totals.mapping_errors += 1,
        }

        self.outcomes.push(KeyOutcome {
            natural_key: natural_key.into(),
            outcome,
            detail,
        });
    }
}

fn describe_issue(issue: &MappingIssue) -> String {
    format!(
        "{} = {} in record {}: {}",
        issue.source_field, issue.raw_value, issue.snapshot_id, issue.reason
    )
}

/// Replicates staging snapshots into the destination.
#[derive(Debug)]
pub struct SyncPipeline<S, D, C> {
    name: String,
    source_tag: String,
    staging: S,
    destination: D,
    checkpoints: C,
    schema: SnapshotSchema,
    filter: StatusFilter,
    builder: EntityBuilder,
    detector: ConflictDetector<D>,
    coordinator: BatchCommitCoordinator<D>,
    page_size: usize,
    max_operations: usize,
    max_concurrent_lookups: usize,
}

impl<S, D, C> SyncPipeline<S, D, C>
where
    S: StagingStore + Sync,
    D: DestinationStore + Clone + Send + Sync,
    C: CheckpointStore + Clone,
{
    pub fn new(
        config: &FieldsyncConfig,
        staging: S,
        destination: D,
        checkpoints: C,
    ) -> SyncResult<Self> {
        let source_tag = config.pipeline.source_tag.clone();

        Ok(Self {
            name: config.pipeline.name.clone(),
            builder: EntityBuilder::from_config(config)?,
            schema: SnapshotSchema::new(config.mapping.snapshot.clone()),
            filter: StatusFilter::from(&config.sync.status_filter),
            detector: ConflictDetector::new(
                destination.clone(),
                source_tag.clone(),
                config.sync.max_concurrent_lookups,
            ),
            coordinator: BatchCommitCoordinator::new(
                destination.clone(),
                config.pipeline.name.clone(),
                config.batch.commit_retries,
            ),
            source_tag,
            staging,
            destination,
            checkpoints,
            page_size: config.sync.page_size,
            max_operations: config.batch.max_operations,
            max_concurrent_lookups: config.sync.max_concurrent_lookups,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs until staging is exhausted or a limit in `options` is hit.
    ///
    /// A batch that keeps failing ends the run with [`StopReason::CommitFailure`]. Every
    /// batch committed before it stays committed and recorded, and the cursor is left at
    /// the start of the failed page. Other errors are returned.
    pub async fn run(&self, options: &RunOptions) -> SyncResult<RunReport> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut manager = CheckpointManager::start(
            self.checkpoints.clone(),
            &self.destination,
            &self.name,
            &self.source_tag,
            !options.dry_run,
        )
        .await?;

        info!(
            pipeline = %self.name,
            run_id = %manager.checkpoint().run_id,
            dry_run = options.dry_run,
            max_pages = options.max_pages,
            "sync run started"
        );

        let mut ledger = RunLedger {
            pipeline: self.name.clone(),
            totals: RunTotals::default(),
            outcomes: Vec::new(),
        };
        let mut pages = 0u64;
        let mut error = None;

        let stop_reason = loop {
            if options.max_pages.is_some_and(|max| pages >= max) {
                break StopReason::PageLimit;
            }
            if options.max_runtime.is_some_and(|budget| clock.elapsed() >= budget) {
                break StopReason::TimeBudget;
            }

            let batch = manager
                .next_unprocessed_batch(&self.staging, &self.filter, &self.schema, self.page_size)
                .await?;
            let next_cursor = batch.next_cursor.clone();

            match self
                .process_page(&mut manager, batch, options.dry_run, started_at, &mut ledger)
                .await
            {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::CommitFailure => {
                    error = Some(err.to_string());
                    break StopReason::CommitFailure;
                }
                Err(err) => return Err(err),
            }

            manager.complete_page(next_cursor.clone()).await?;
            pages += 1;
            ledger.totals.pages_completed += 1;
            counter!(FIELDSYNC_PAGES_COMPLETED_TOTAL, PIPELINE_LABEL => self.name.clone())
                .increment(1);

            if next_cursor.is_none() {
                manager.finish().await?;
                break StopReason::Exhausted;
            }
        };

        let report = RunReport {
            pipeline: self.name.clone(),
            source_tag: self.source_tag.clone(),
            run_id: manager.checkpoint().run_id,
            dry_run: options.dry_run,
            resumed: manager.resumed(),
            started_at,
            finished_at: Utc::now(),
            stop_reason,
            error,
            totals: ledger.totals,
            outcomes: ledger.outcomes,
        };

        info!(
            pipeline = %self.name,
            stop_reason = ?report.stop_reason,
            keys_synced = report.totals.keys_synced,
            conflicts = report.totals.conflicts,
            missing_keys = report.totals.missing_keys,
            pages = report.totals.pages_completed,
            "sync run finished"
        );

        Ok(report)
    }

    async fn process_page(
        &self,
        manager: &mut CheckpointManager<C>,
        batch: UnprocessedBatch,
        dry_run: bool,
        started_at: DateTime<Utc>,
        ledger: &mut RunLedger,
    ) -> SyncResult<()> {
        ledger.totals.records_read += batch.records_read as u64;
        ledger.totals.records_excluded += batch.excluded_records as u64;

        for missing in batch.missing_keys {
            warn!(
                record_id = %missing.snapshot_id,
                import_batch = missing.import_batch.as_deref(),
                source_file = missing.source_file.as_deref(),
                "staging record has no natural key, skipped"
            );
            ledger.record("", Outcome::MissingKey, missing.to_string());
        }

        let prepared = try_fan_out(&batch.candidate_keys, self.max_concurrent_lookups, |key| {
            self.prepare_key(key)
        })
        .await?;

        let mut writes = Vec::new();
        let mut history_sizes = HashMap::new();
        let mut handled = Vec::new();

        for PreparedKey {
            natural_key,
            outcome,
            snapshots,
        } in prepared
        {
            match outcome {
                ConflictOutcome::AlreadySynced => {
                    ledger.record(natural_key.clone(), Outcome::AlreadySynced, String::new());
                    handled.push(natural_key);
                }
                ConflictOutcome::PreExistingConflict { existing_source } => {
                    let existing = existing_source.as_deref().unwrap_or("<none>");
                    warn!(
                        natural_key = %natural_key,
                        existing_source = existing,
                        "entity exists without this pipeline's tag, routed to manual review"
                    );
                    ledger.record(
                        natural_key.clone(),
                        Outcome::Conflict,
                        format!("existing lastSyncedFrom: {existing}"),
                    );
                    handled.push(natural_key);
                }
                ConflictOutcome::New => {
                    let Some(built) = self.builder.build(&natural_key, &snapshots, started_at)
                    else {
                        warn!(natural_key = %natural_key, "no snapshots resolve to key, skipped");
                        ledger.record(
                            natural_key.clone(),
                            Outcome::MissingKey,
                            "no staging record resolves to this key".to_string(),
                        );
                        handled.push(natural_key);
                        continue;
                    };

                    for issue in &built.issues {
                        warn!(
                            natural_key = %issue.natural_key,
                            record_id = %issue.snapshot_id,
                            field = %issue.source_field,
                            reason = %issue.reason,
                            "field could not be mapped, omitted"
                        );
                        ledger.record(
                            natural_key.clone(),
                            Outcome::MappingError,
                            describe_issue(issue),
                        );
                    }
                    ledger.totals.snapshots_without_status += built.dropped_without_status as u64;
                    history_sizes.insert(natural_key, built.write.history.len());
                    writes.push(built.write);
                }
            }
        }
        manager.record_handled(handled);

        for planned in plan_batches(writes, self.max_operations) {
            if !dry_run {
                self.coordinator.commit(&planned).await?;
                ledger.totals.batches_committed += 1;
                ledger.totals.history_entries_written += planned.history_entries as u64;
            }
            manager.record_committed(&planned.keys_completed).await?;

            let outcome = if dry_run {
                Outcome::WouldSync
            } else {
                Outcome::Synced
            };
            for key in &planned.keys_completed {
                let entries = history_sizes.get(key).copied().unwrap_or_default();
                ledger.record(key.clone(), outcome, format!("{entries} history entries"));
            }
        }

        Ok(())
    }

    async fn prepare_key(&self, natural_key: &str) -> SyncResult<PreparedKey> {
        let outcome = self.detector.classify(natural_key).await?;
        if !outcome.is_writable() {
            return Ok(PreparedKey {
                natural_key: natural_key.to_string(),
                outcome,
                snapshots: Vec::new(),
            });
        }

        let records = self
            .staging
            .records_for_key(self.schema.natural_key_fields(), natural_key)
            .await?;
        let snapshots: Vec<RawSnapshot> = records
            .iter()
            .filter_map(|record| self.schema.extract(record).ok())
            .filter(|snapshot| snapshot.natural_key == natural_key)
            .collect();

        counter!(FIELDSYNC_SNAPSHOTS_READ_TOTAL, PIPELINE_LABEL => self.name.clone())
            .increment(snapshots.len() as u64);

        Ok(PreparedKey {
            natural_key: natural_key.to_string(),
            outcome,
            snapshots,
        })
    }
}
