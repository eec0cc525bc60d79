use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::types::PageCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    /// A pass is in progress and resumes from its cursor.
    Running,
    /// The last pass reached the end of staging.
    Completed,
}

/// Persisted progress of one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Checkpoint {
    pub pipeline: String,
    pub source_tag: String,
    /// Identifies the pass that created this checkpoint.
    pub run_id: Uuid,
    /// Last fully processed staging position, [`None`] before the first page.
    pub cursor: Option<PageCursor>,
    pub pages_completed: u64,
    pub keys_committed: u64,
    pub status: CheckpointStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Starts a fresh pass from the first staging page.
    pub fn new(pipeline: impl Into<String>, source_tag: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            pipeline: pipeline.into(),
            source_tag: source_tag.into(),
            run_id: Uuid::new_v4(),
            cursor: None,
            pages_completed: 0,
            keys_committed: 0,
            status: CheckpointStatus::Running,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == CheckpointStatus::Running
    }
}

/// Persists checkpoints keyed by pipeline name.
pub trait CheckpointStore {
    fn load(&self, pipeline: &str) -> impl Future<Output = SyncResult<Option<Checkpoint>>> + Send;

    /// Stores `checkpoint`, replacing the previous one for its pipeline.
    fn save(&self, checkpoint: &Checkpoint) -> impl Future<Output = SyncResult<()>> + Send;
}
