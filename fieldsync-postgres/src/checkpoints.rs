use chrono::{DateTime, Utc};
use sqlx::{PgPool, Type, prelude::FromRow};
use uuid::Uuid;

/// Checkpoint status as stored in the database.
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq)]
#[sqlx(type_name = "fieldsync.checkpoint_status", rename_all = "snake_case")]
pub enum CheckpointStatus {
    Running,
    Completed,
}

/// A row from the fieldsync.checkpoints table.
#[derive(Debug, Clone, FromRow)]
pub struct CheckpointRow {
    pub pipeline: String,
    pub source_tag: String,
    pub run_id: Uuid,
    pub cursor: Option<String>,
    pub pages_completed: i64,
    pub keys_committed: i64,
    pub status: CheckpointStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn get_checkpoint(pool: &PgPool, pipeline: &str) -> sqlx::Result<Option<CheckpointRow>> {
    sqlx::query_as::<_, CheckpointRow>(
        r#"
        select pipeline, source_tag, run_id, cursor, pages_completed, keys_committed,
               status, started_at, updated_at
        from fieldsync.checkpoints
        where pipeline = $1
        "#,
    )
    .bind(pipeline)
    .fetch_optional(pool)
    .await
}

/// Stores the checkpoint, replacing any previous one for the same pipeline.
pub async fn upsert_checkpoint(pool: &PgPool, row: &CheckpointRow) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        insert into fieldsync.checkpoints
            (pipeline, source_tag, run_id, cursor, pages_completed, keys_committed,
             status, started_at, updated_at)
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        on conflict (pipeline) do update
        set source_tag = excluded.source_tag,
            run_id = excluded.run_id,
            cursor = excluded.cursor,
            pages_completed = excluded.pages_completed,
            keys_committed = excluded.keys_committed,
            status = excluded.status,
            started_at = excluded.started_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&row.pipeline)
    .bind(&row.source_tag)
    .bind(row.run_id)
    .bind(&row.cursor)
    .bind(row.pages_completed)
    .bind(row.keys_committed)
    .bind(row.status)
    .bind(row.started_at)
    .bind(row.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}
