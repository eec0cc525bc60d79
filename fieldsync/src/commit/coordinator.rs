use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, warn};

use crate::commit::PlannedBatch;
use crate::error::{ErrorKind, SyncResult};
use crate::metrics::{
    FIELDSYNC_BATCH_COMMIT_DURATION_SECONDS, FIELDSYNC_BATCH_COMMIT_FAILURES_TOTAL,
    FIELDSYNC_BATCHES_COMMITTED_TOTAL, FIELDSYNC_HISTORY_ENTRIES_WRITTEN_TOTAL, PIPELINE_LABEL,
};
use crate::store::destination::DestinationStore;
use crate::sync_error;

/// Commits planned batches to the destination, one at a time.
#[derive(Debug, Clone)]
pub struct BatchCommitCoordinator<D> {
    destination: D,
    pipeline: String,
    commit_retries: u32,
}

impl<D> BatchCommitCoordinator<D>
where
    D: DestinationStore,
{
    pub fn new(destination: D, pipeline: impl Into<String>, commit_retries: u32) -> Self {
        Self {
            destination,
            pipeline: pipeline.into(),
            commit_retries,
        }
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Commits `planned`, retrying immediately up to the configured number of times.
    ///
    /// Returns [`ErrorKind::CommitFailure`] once every attempt was rejected. Nothing
    /// from the batch is visible in that case.
    pub async fn commit(&self, planned: &PlannedBatch) -> SyncResult<()> {
        let attempts = self.commit_retries + 1;
        let mut attempt = 1;

        loop {
            let started = Instant::now();
            let result = self.try_commit(planned).await;
            histogram!(
                FIELDSYNC_BATCH_COMMIT_DURATION_SECONDS,
                PIPELINE_LABEL => self.pipeline.clone()
            )
            .record(started.elapsed().as_secs_f64());

            let err = match result {
                Ok(()) => {
                    counter!(
                        FIELDSYNC_BATCHES_COMMITTED_TOTAL,
                        PIPELINE_LABEL => self.pipeline.clone()
                    )
                    .increment(1);
                    counter!(
                        FIELDSYNC_HISTORY_ENTRIES_WRITTEN_TOTAL,
                        PIPELINE_LABEL => self.pipeline.clone()
                    )
                    .increment(planned.history_entries as u64);
                    debug!(
                        operations = planned.batch.len(),
                        keys = planned.keys_completed.len(),
                        attempt,
                        "batch committed"
                    );

                    return Ok(());
                }
                Err(err) => err,
            };

            counter!(FIELDSYNC_BATCH_COMMIT_FAILURES_TOTAL, PIPELINE_LABEL => self.pipeline.clone())
                .increment(1);

            if attempt >= attempts {
                error!(
                    error = %err,
                    attempts,
                    operations = planned.batch.len(),
                    destination = self.destination.name(),
                    "batch commit failed"
                );

                return Err(sync_error!(
                    ErrorKind::CommitFailure,
                    "Batch commit failed",
                    format!(
                        "{} operations covering {} keys were rejected {attempts} times",
                        planned.batch.len(),
                        planned.keys_completed.len()
                    ),
                    source: err
                ));
            }

            warn!(error = %err, attempt, "batch commit rejected, retrying");
            attempt += 1;
        }
    }

    async fn try_commit(&self, planned: &PlannedBatch) -> SyncResult<()> {
        #[cfg(feature = "failpoints")]
        crate::failpoints::sync_fail_point(crate::failpoints::COMMIT_BEFORE_BATCH)?;

        self.destination.commit(&planned.batch).await
    }
}
