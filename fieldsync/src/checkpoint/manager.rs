use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info};

use crate::checkpoint::{Checkpoint, CheckpointStatus, CheckpointStore};
use crate::error::SyncResult;
use crate::mapping::{MissingKey, SnapshotSchema};
use crate::store::destination::DestinationStore;
use crate::store::staging::StagingStore;
use crate::types::{PageCursor, StatusFilter};

/// Candidate keys of one staging page that still need work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnprocessedBatch {
    /// Distinct candidate keys in order of first appearance on the page.
    pub candidate_keys: Vec<String>,
    /// Records on the page without a resolvable natural key.
    pub missing_keys: Vec<MissingKey>,
    /// Records skipped because their key was already migrated or handled this run.
    pub excluded_records: usize,
    pub records_read: usize,
    /// Cursor after this page, [`None`] once staging is exhausted.
    pub next_cursor: Option<PageCursor>,
}

/// Tracks which keys and pages a pipeline has already migrated.
#[derive(Debug)]
pub struct CheckpointManager<C> {
    store: C,
    checkpoint: Checkpoint,
    exclusion: HashSet<String>,
    persist: bool,
    resumed: bool,
}

impl<C> CheckpointManager<C>
where
    C: CheckpointStore,
{
    /// Loads or creates the checkpoint of `pipeline` and rebuilds the exclusion set.
    ///
    /// A running checkpoint resumes from its cursor. A completed one starts a fresh
    /// pass from the first page. Nothing is written when `persist` is false.
    pub async fn start<D>(
        store: C,
        destination: &D,
        pipeline: &str,
        source_tag: &str,
        persist: bool,
    ) -> SyncResult<Self>
    where
        D: DestinationStore,
    {
        let (checkpoint, resumed) = match store.load(pipeline).await? {
            Some(existing) if existing.is_running() && existing.source_tag == source_tag => {
                (existing, true)
            }
            _ => (Checkpoint::new(pipeline, source_tag), false),
        };

        let exclusion: HashSet<String> = destination
            .keys_by_source(source_tag)
            .await?
            .into_iter()
            .collect();

        info!(
            pipeline,
            run_id = %checkpoint.run_id,
            resumed,
            cursor = checkpoint.cursor.as_ref().map(PageCursor::as_str),
            already_migrated = exclusion.len(),
            "checkpoint loaded"
        );

        let manager = Self {
            store,
            checkpoint,
            exclusion,
            persist,
            resumed,
        };
        manager.save().await?;

        Ok(manager)
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Whether this run continues a pass interrupted earlier.
    pub fn resumed(&self) -> bool {
        self.resumed
    }

    pub fn is_excluded(&self, natural_key: &str) -> bool {
        self.exclusion.contains(natural_key)
    }

    pub fn excluded_count(&self) -> usize {
        self.exclusion.len()
    }

    /// Fetches the page after the cursor and filters it against the exclusion set.
    pub async fn next_unprocessed_batch<S>(
        &self,
        staging: &S,
        filter: &StatusFilter,
        schema: &SnapshotSchema,
        page_size: usize,
    ) -> SyncResult<UnprocessedBatch>
    where
        S: StagingStore,
    {
        let page = staging
            .fetch_page(filter, self.checkpoint.cursor.as_ref(), page_size)
            .await?;

        let mut batch = UnprocessedBatch {
            records_read: page.records.len(),
            next_cursor: page.next_cursor,
            ..Default::default()
        };
        let mut seen = HashSet::new();

        for record in &page.records {
            let Some(key) = schema.natural_key(record) else {
                if let Err(missing) = schema.extract(record) {
                    batch.missing_keys.push(missing);
                }
                continue;
            };

            if self.exclusion.contains(&key) {
                batch.excluded_records += 1;
                continue;
            }
            if seen.insert(key.clone()) {
                batch.candidate_keys.push(key);
            }
        }

        debug!(
            records = batch.records_read,
            candidates = batch.candidate_keys.len(),
            excluded = batch.excluded_records,
            missing_keys = batch.missing_keys.len(),
            "fetched unprocessed batch"
        );

        Ok(batch)
    }

    /// Records keys whose writes were committed.
    pub async fn record_committed(&mut self, keys: &[String]) -> SyncResult<()> {
        self.exclusion.extend(keys.iter().cloned());
        self.checkpoint.keys_committed += keys.len() as u64;
        self.touch_and_save().await
    }

    /// Excludes keys for the rest of this run without counting them as committed.
    pub fn record_handled(&mut self, keys: impl IntoIterator<Item = String>) {
        self.exclusion.extend(keys);
    }

    /// Advances the cursor past a fully processed page.
    pub async fn complete_page(&mut self, next_cursor: Option<PageCursor>) -> SyncResult<()> {
        if let Some(cursor) = next_cursor {
            self.checkpoint.cursor = Some(cursor);
        }
        self.checkpoint.pages_completed += 1;
        self.touch_and_save().await
    }

    /// Marks the pass as having reached the end of staging.
    pub async fn finish(&mut self) -> SyncResult<()> {
        self.checkpoint.status = CheckpointStatus::Completed;
        self.touch_and_save().await
    }

    async fn touch_and_save(&mut self) -> SyncResult<()> {
        self.checkpoint.updated_at = Utc::now();
        self.save().await
    }

    async fn save(&self) -> SyncResult<()> {
        if !self.persist {
            return Ok(());
        }

        self.store.save(&self.checkpoint).await
    }
}
