//! Store wrappers with injectable write failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::mirror::Warehouse;
use crate::store::destination::{DestinationStore, StoredHistoryEntry};
use crate::types::{ChangeEvent, DeadLetterRecord, Document, SyncFailure, WriteBatch};

/// Failure modes for [`FaultyDestination::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFault {
    /// The next `n` commits are rejected.
    FailCommits(u32),
    /// After `successes` commits go through, the next `failures` are rejected.
    FailCommitsAfter { successes: u32, failures: u32 },
}

#[derive(Debug, Default)]
struct DestinationFaults {
    fault: Option<WriteFault>,
    attempts: u32,
}

impl DestinationFaults {
    /// Counts one attempt and reports whether it must fail.
    fn should_fail(&mut self) -> bool {
        self.attempts += 1;

        let (fail, next) = match self.fault {
            None => (false, None),
            Some(WriteFault::FailCommits(n))
            | Some(WriteFault::FailCommitsAfter {
                successes: 0,
                failures: n,
            }) => (n > 0, (n > 1).then(|| WriteFault::FailCommits(n - 1))),
            Some(WriteFault::FailCommitsAfter {
                successes,
                failures,
            }) => (
                false,
                Some(WriteFault::FailCommitsAfter {
                    successes: successes - 1,
                    failures,
                }),
            ),
        };
        self.fault = next;

        fail
    }
}

/// Destination whose commits can be made to fail before reaching the wrapped store.
#[derive(Debug, Clone)]
pub struct FaultyDestination<D> {
    inner: D,
    faults: Arc<Mutex<DestinationFaults>>,
}

impl<D> FaultyDestination<D> {
    pub fn wrap(inner: D) -> Self {
        Self {
            inner,
            faults: Arc::default(),
        }
    }

    pub async fn inject(&self, fault: WriteFault) {
        self.faults.lock().await.fault = Some(fault);
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Number of commits attempted, failed ones included.
    pub async fn commit_attempts(&self) -> u32 {
        self.faults.lock().await.attempts
    }
}

impl<D> DestinationStore for FaultyDestination<D>
where
    D: DestinationStore + Sync,
{
    fn name(&self) -> &'static str {
        "faulty"
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
        if self.faults.lock().await.should_fail() {
            bail!(
                ErrorKind::CommitFailure,
                "Injected commit failure",
                format!("batch of {} operations rejected", batch.len())
            );
        }

        self.inner.commit(batch).await
    }
}

/// Failure modes for [`FaultyWarehouse::apply_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarehouseFault {
    /// The next `n` applies are rejected.
    FailApplies(u32),
    AlwaysFailApplies,
}

/// Warehouse whose event applies can be made to fail.
///
/// Failure bookkeeping always reaches the wrapped warehouse.
#[derive(Debug, Clone)]
pub struct FaultyWarehouse<W> {
    inner: W,
    fault: Arc<Mutex<Option<WarehouseFault>>>,
}

impl<W> FaultyWarehouse<W> {
    pub fn wrap(inner: W) -> Self {
        Self {
            inner,
            fault: Arc::default(),
        }
    }

    pub async fn inject(&self, fault: WarehouseFault) {
        *self.fault.lock().await = Some(fault);
    }

    /// Lets every following apply through.
    pub async fn heal(&self) {
        *self.fault.lock().await = None;
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    async fn should_fail(&self) -> bool {
        let mut fault = self.fault.lock().await;
        match *fault {
            Some(WarehouseFault::AlwaysFailApplies) => true,
            Some(WarehouseFault::FailApplies(n)) if n > 0 => {
                *fault = Some(WarehouseFault::FailApplies(n - 1));
                true
            }
            _ => false,
        }
    }
}

impl<W> Warehouse for FaultyWarehouse<W>
where
    W: Warehouse + Sync,
{
    async fn apply_event(&self, event: &ChangeEvent) -> SyncResult<()> {
        if self.should_fail().await {
            bail!(
                ErrorKind::MirrorWriteFailure,
                "Injected warehouse failure",
                format!("{} {} rejected", event.collection, event.entity_id)
            );
        }

        self.inner.apply_event(event).await
    }

    async fn record_failure(&self, failure: &SyncFailure) -> SyncResult<()> {
        self.inner.record_failure(failure).await
    }

    async fn retryable_failures(
        &self,
        created_after: DateTime<Utc>,
        max_attempts: u32,
        limit: usize,
    ) -> SyncResult<Vec<SyncFailure>> {
        self.inner
            .retryable_failures(created_after, max_attempts, limit)
            .await
    }

    async fn remove_failure(&self, id: Uuid) -> SyncResult<()> {
        self.inner.remove_failure(id).await
    }

    async fn dead_letter(&self, failure: &SyncFailure) -> SyncResult<()> {
        self.inner.dead_letter(failure).await
    }

    async fn failures(&self) -> SyncResult<Vec<SyncFailure>> {
        self.inner.failures().await
    }

    async fn dead_letters(&self) -> SyncResult<Vec<DeadLetterRecord>> {
        self.inner.dead_letters().await
    }

    async fn event_count(&self) -> SyncResult<u64> {
        self.inner.event_count().await
    }
}
