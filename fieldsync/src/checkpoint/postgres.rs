use fieldsync_postgres::checkpoints::{self, CheckpointRow, get_checkpoint, upsert_checkpoint};
use sqlx::PgPool;

use crate::checkpoint::{Checkpoint, CheckpointStatus, CheckpointStore};
use crate::error::{ErrorKind, SyncResult};
use crate::store::store_error;
use crate::types::PageCursor;

/// Checkpoint store backed by `fieldsync.checkpoints`.
#[derive(Debug, Clone)]
pub struct PostgresCheckpointStore {
    pool: PgPool,
}

impl PostgresCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<CheckpointRow> for Checkpoint {
    fn from(row: CheckpointRow) -> Self {
        Checkpoint {
            pipeline: row.pipeline,
            source_tag: row.source_tag,
            run_id: row.run_id,
            cursor: row.cursor.map(PageCursor::new),
            pages_completed: row.pages_completed.max(0) as u64,
            keys_committed: row.keys_committed.max(0) as u64,
            status: match row.status {
                checkpoints::CheckpointStatus::Running => CheckpointStatus::Running,
                checkpoints::CheckpointStatus::Completed => CheckpointStatus::Completed,
            },
            started_at: row.started_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&Checkpoint> for CheckpointRow {
    fn from(checkpoint: &Checkpoint) -> Self {
        CheckpointRow {
            pipeline: checkpoint.pipeline.clone(),
            source_tag: checkpoint.source_tag.clone(),
            run_id: checkpoint.run_id,
            cursor: checkpoint.cursor.as_ref().map(|c| c.as_str().to_string()),
            pages_completed: checkpoint.pages_completed as i64,
            keys_committed: checkpoint.keys_committed as i64,
            status: match checkpoint.status {
                CheckpointStatus::Running => checkpoints::CheckpointStatus::Running,
                CheckpointStatus::Completed => checkpoints::CheckpointStatus::Completed,
            },
            started_at: checkpoint.started_at,
            updated_at: checkpoint.updated_at,
        }
    }
}

impl CheckpointStore for PostgresCheckpointStore {
    async fn load(&self, pipeline: &str) -> SyncResult<Option<Checkpoint>> {
        let row = get_checkpoint(&self.pool, pipeline)
            .await
            .map_err(|err| store_error(err, ErrorKind::CheckpointStoreFailed))?;

        Ok(row.map(Checkpoint::from))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> SyncResult<()> {
        upsert_checkpoint(&self.pool, &CheckpointRow::from(checkpoint))
            .await
            .map_err(|err| store_error(err, ErrorKind::CheckpointStoreFailed))
    }
}
