use metrics::counter;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::SyncResult;
use crate::metrics::{
    COLLECTION_LABEL, FIELDSYNC_MIRROR_EVENTS_APPLIED_TOTAL, FIELDSYNC_MIRROR_FAILURES_TOTAL,
};
use crate::mirror::{EventReceiver, Warehouse};
use crate::types::{ChangeEvent, SyncFailure};

/// Counts of what a [`MirrorWorker`] did with the events it received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MirrorSummary {
    pub applied: u64,
    /// Events that failed and were queued for retry.
    pub failed: u64,
    /// Events that failed and whose failure could not be recorded either.
    pub unrecorded: u64,
}

/// Applies one event to the warehouse.
pub(crate) async fn apply_to_warehouse<W>(warehouse: &W, event: &ChangeEvent) -> SyncResult<()>
where
    W: Warehouse,
{
    #[cfg(feature = "failpoints")]
    crate::failpoints::sync_fail_point(crate::failpoints::MIRROR_BEFORE_APPLY)?;

    warehouse.apply_event(event).await
}

/// Drains captured change events into the warehouse.
#[derive(Debug)]
pub struct MirrorWorker<W> {
    warehouse: W,
    events: EventReceiver,
    summary: MirrorSummary,
}

impl<W> MirrorWorker<W>
where
    W: Warehouse,
{
    pub fn new(warehouse: W, events: EventReceiver) -> Self {
        Self {
            warehouse,
            events,
            summary: MirrorSummary::default(),
        }
    }

    /// Processes every event queued right now and returns the running totals.
    pub async fn drain(&mut self) -> MirrorSummary {
        while let Ok(event) = self.events.try_recv() {
            self.handle(event).await;
        }

        self.summary
    }

    /// Processes events until every sender is dropped or shutdown is requested.
    ///
    /// Events already queued at shutdown are still applied.
    pub async fn run(mut self, mut shutdown: ShutdownRx) -> MirrorSummary {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => {
                    info!("mirror worker shutting down");
                    return self.drain().await;
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!("change event channel closed");
                        return self.summary;
                    };
                    self.handle(event).await;
                }
            }
        }
    }

    async fn handle(&mut self, event: ChangeEvent) {
        match apply_to_warehouse(&self.warehouse, &event).await {
            Ok(()) => {
                counter!(
                    FIELDSYNC_MIRROR_EVENTS_APPLIED_TOTAL,
                    COLLECTION_LABEL => event.collection.clone()
                )
                .increment(1);
                self.summary.applied += 1;
            }
            Err(err) => {
                counter!(
                    FIELDSYNC_MIRROR_FAILURES_TOTAL,
                    COLLECTION_LABEL => event.collection.clone()
                )
                .increment(1);
                warn!(
                    error = %err,
                    collection = %event.collection,
                    entity_id = %event.entity_id,
                    "mirror write failed, queueing for retry"
                );

                let failure = SyncFailure::from_event(&event, err.to_string());
                if let Err(record_err) = self.warehouse.record_failure(&failure).await {
                    error!(
                        error = %record_err,
                        collection = %event.collection,
                        entity_id = %event.entity_id,
                        operation = event.operation.as_str(),
                        "could not record mirror failure"
                    );
                    self.summary.unrecorded += 1;
                    return;
                }
                self.summary.failed += 1;
            }
        }
    }
}
