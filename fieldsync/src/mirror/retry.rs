use std::time::Duration;

use chrono::Utc;
use fieldsync_config::shared::MirrorConfig;
use metrics::counter;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::bail;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, SyncResult};
use crate::metrics::{COLLECTION_LABEL, FIELDSYNC_MIRROR_DEAD_LETTERS_TOTAL};
use crate::mirror::worker::apply_to_warehouse;
use crate::mirror::{CollectionTags, Warehouse};
use crate::store::destination::DestinationStore;
use crate::types::{ChangeEvent, ChangeOperation, SyncFailure};

/// Lifecycle of a failed mirror write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MirrorState {
    /// Failed once on the capture path, not retried yet.
    Pending,
    /// Failed `attempts` retries so far.
    Retrying { attempts: u32 },
    Applied,
    DeadLettered { attempts: u32 },
}

impl MirrorState {
    pub fn of(failure: &SyncFailure) -> Self {
        match failure.retry_count {
            0 => MirrorState::Pending,
            attempts => MirrorState::Retrying { attempts },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MirrorState::Applied | MirrorState::DeadLettered { .. })
    }
}

/// Result of one retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    Succeeded,
    Failed,
}

/// Moves a failure through its lifecycle after one retry attempt.
///
/// A failure is dead-lettered by the attempt that brings its failed retries to
/// `max_attempts`. Terminal states never change.
pub fn next_state(state: MirrorState, result: AttemptResult, max_attempts: u32) -> MirrorState {
    let attempts = match state {
        MirrorState::Applied | MirrorState::DeadLettered { .. } => return state,
        MirrorState::Pending => 0,
        MirrorState::Retrying { attempts } => attempts,
    };

    match result {
        AttemptResult::Succeeded => MirrorState::Applied,
        AttemptResult::Failed if attempts + 1 >= max_attempts => MirrorState::DeadLettered {
            attempts: attempts + 1,
        },
        AttemptResult::Failed => MirrorState::Retrying {
            attempts: attempts + 1,
        },
    }
}

/// Outcome counts of one retry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryPassSummary {
    pub examined: u64,
    pub applied: u64,
    pub still_failing: u64,
    pub dead_lettered: u64,
}

/// Re-attempts recorded mirror failures from the current production state.
#[derive(Debug, Clone)]
pub struct RetryWorker<D, W> {
    destination: D,
    warehouse: W,
    tags: CollectionTags,
    config: MirrorConfig,
}

impl<D, W> RetryWorker<D, W>
where
    D: DestinationStore,
    W: Warehouse,
{
    pub fn new(destination: D, warehouse: W, tags: CollectionTags, config: MirrorConfig) -> Self {
        Self {
            destination,
            warehouse,
            tags,
            config,
        }
    }

    /// Retries every eligible failure once.
    ///
    /// Failures older than the retention window are left for manual inspection.
    pub async fn run_pass(&self) -> SyncResult<RetryPassSummary> {
        let created_after =
            Utc::now() - chrono::Duration::hours(i64::from(self.config.retention_hours));
        let failures = self
            .warehouse
            .retryable_failures(
                created_after,
                self.config.max_attempts,
                self.config.retry_batch_limit as usize,
            )
            .await?;

        let mut summary = RetryPassSummary::default();
        for failure in failures {
            summary.examined += 1;
            match self.retry(failure).await? {
                MirrorState::Applied => summary.applied += 1,
                MirrorState::DeadLettered { .. } => summary.dead_lettered += 1,
                MirrorState::Pending | MirrorState::Retrying { .. } => summary.still_failing += 1,
            }
        }

        info!(
            examined = summary.examined,
            applied = summary.applied,
            still_failing = summary.still_failing,
            dead_lettered = summary.dead_lettered,
            "mirror retry pass finished"
        );

        Ok(summary)
    }

    /// Runs passes every retry interval until shutdown is requested.
    pub async fn run(&self, mut shutdown: ShutdownRx) -> SyncResult<RetryPassSummary> {
        let interval = Duration::from_secs(self.config.retry_interval_secs);
        let mut total = RetryPassSummary::default();

        loop {
            let pass = self.run_pass().await?;
            total.examined += pass.examined;
            total.applied += pass.applied;
            total.still_failing += pass.still_failing;
            total.dead_lettered += pass.dead_lettered;

            tokio::select! {
                _ = shutdown.wait() => return Ok(total),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    async fn retry(&self, mut failure: SyncFailure) -> SyncResult<MirrorState> {
        let attempt = match self.resolve_event(&failure).await {
            Ok(event) => apply_to_warehouse(&self.warehouse, &event).await,
            Err(err) => Err(err),
        };

        let result = match &attempt {
            Ok(()) => AttemptResult::Succeeded,
            Err(_) => AttemptResult::Failed,
        };
        let state = next_state(MirrorState::of(&failure), result, self.config.max_attempts);
        if let Err(err) = attempt {
            failure.last_error = err.to_string();
        }

        match state {
            MirrorState::Applied => {
                self.warehouse.remove_failure(failure.id).await?;
            }
            MirrorState::Retrying { attempts } => {
                failure.retry_count = attempts;
                warn!(
                    failure_id = %failure.id,
                    entity_id = %failure.entity_id,
                    attempts,
                    "mirror retry failed"
                );
                self.warehouse.record_failure(&failure).await?;
            }
            MirrorState::DeadLettered { attempts } => {
                failure.retry_count = attempts;
                error!(
                    failure_id = %failure.id,
                    collection = %failure.collection,
                    entity_id = %failure.entity_id,
                    attempts,
                    last_error = %failure.last_error,
                    "mirror failure moved to dead letters"
                );
                counter!(
                    FIELDSYNC_MIRROR_DEAD_LETTERS_TOTAL,
                    COLLECTION_LABEL => failure.collection.clone()
                )
                .increment(1);
                self.warehouse.dead_letter(&failure).await?;
            }
            MirrorState::Pending => {}
        }

        Ok(state)
    }

    /// Rebuilds the event from what production holds now.
    ///
    /// A missing document becomes a delete.
    async fn resolve_event(&self, failure: &SyncFailure) -> SyncResult<ChangeEvent> {
        let current = if failure.collection == self.tags.entities {
            self.destination.get_entity(&failure.entity_id).await?
        } else if failure.collection == self.tags.history {
            let Some((natural_key, entry_id)) =
                CollectionTags::split_history_entity_id(&failure.entity_id)
            else {
                bail!(
                    ErrorKind::InvalidState,
                    "Malformed history entity id",
                    failure.entity_id.clone()
                );
            };
            self.destination
                .get_history_entry(natural_key, entry_id)
                .await?
                .map(|entry| entry.document)
        } else {
            bail!(
                ErrorKind::InvalidState,
                "Unknown mirror collection",
                failure.collection.clone()
            );
        };

        let operation = match (&current, failure.operation) {
            (None, _) => ChangeOperation::Delete,
            (Some(_), ChangeOperation::Create) => ChangeOperation::Create,
            (Some(_), _) => ChangeOperation::Update,
        };

        Ok(ChangeEvent {
            collection: failure.collection.clone(),
            entity_id: failure.entity_id.clone(),
            operation,
            before: None,
            after: current,
            timestamp: Utc::now(),
        })
    }
}
