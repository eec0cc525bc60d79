use chrono::{DateTime, Utc};
use sqlx::{PgPool, Type, prelude::FromRow};
use uuid::Uuid;

/// Change operation as stored in the warehouse.
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq)]
#[sqlx(type_name = "warehouse.change_operation", rename_all = "snake_case")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

/// A change event about to be appended to warehouse.events.
#[derive(Debug, Clone)]
pub struct ChangeEventRow {
    pub collection: String,
    pub entity_id: String,
    pub operation: ChangeOperation,
    pub data: Option<serde_json::Value>,
    pub previous_data: Option<serde_json::Value>,
    pub event_timestamp: DateTime<Utc>,
}

/// A row from warehouse.sync_failures.
#[derive(Debug, Clone, FromRow)]
pub struct SyncFailureRow {
    pub id: Uuid,
    pub collection: String,
    pub entity_id: String,
    pub operation: ChangeOperation,
    pub last_error: String,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

/// A row from warehouse.dead_letters.
#[derive(Debug, Clone, FromRow)]
pub struct DeadLetterRow {
    #[sqlx(flatten)]
    pub failure: SyncFailureRow,
    pub dead_lettered_at: DateTime<Utc>,
}

/// Appends the event and updates the current state projection in one transaction.
///
/// Replaying an event that was already recorded is a no-op for the log, and the
/// projection never moves back to an older timestamp.
pub async fn apply_change_event(pool: &PgPool, event: &ChangeEventRow) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        insert into warehouse.events
            (collection, entity_id, operation, data, previous_data, event_timestamp)
        values ($1, $2, $3, $4, $5, $6)
        on conflict (collection, entity_id, event_timestamp) do nothing
        "#,
    )
    .bind(&event.collection)
    .bind(&event.entity_id)
    .bind(event.operation)
    .bind(&event.data)
    .bind(&event.previous_data)
    .bind(event.event_timestamp)
    .execute(&mut *tx)
    .await?;

    let is_deleted = event.operation == ChangeOperation::Delete;
    sqlx::query(
        r#"
        insert into warehouse.current_state (collection, entity_id, data, is_deleted, updated_at)
        values ($1, $2, $3, $4, $5)
        on conflict (collection, entity_id) do update
        set data = case when excluded.is_deleted then warehouse.current_state.data else excluded.data end,
            is_deleted = excluded.is_deleted,
            updated_at = excluded.updated_at
        where warehouse.current_state.updated_at <= excluded.updated_at
        "#,
    )
    .bind(&event.collection)
    .bind(&event.entity_id)
    .bind(&event.data)
    .bind(is_deleted)
    .bind(event.event_timestamp)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

pub async fn count_events(pool: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar("select count(*) from warehouse.events")
        .fetch_one(pool)
        .await
}

/// Inserts or updates a failure keyed by its id.
pub async fn upsert_sync_failure(pool: &PgPool, row: &SyncFailureRow) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        insert into warehouse.sync_failures
            (id, collection, entity_id, operation, last_error, retry_count, created_at)
        values ($1, $2, $3, $4, $5, $6, $7)
        on conflict (id) do update
        set last_error = excluded.last_error,
            retry_count = greatest(warehouse.sync_failures.retry_count, excluded.retry_count),
            last_attempt_at = now()
        "#,
    )
    .bind(row.id)
    .bind(&row.collection)
    .bind(&row.entity_id)
    .bind(row.operation)
    .bind(&row.last_error)
    .bind(row.retry_count)
    .bind(row.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns failures created after `created_after` with fewer than `max_attempts` retries.
pub async fn get_retryable_failures(
    pool: &PgPool,
    created_after: DateTime<Utc>,
    max_attempts: i32,
    limit: i64,
) -> sqlx::Result<Vec<SyncFailureRow>> {
    sqlx::query_as::<_, SyncFailureRow>(
        r#"
        select id, collection, entity_id, operation, last_error, retry_count, created_at
        from warehouse.sync_failures
        where retry_count < $2 and created_at > $1
        order by created_at, id
        limit $3
        "#,
    )
    .bind(created_after)
    .bind(max_attempts)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn get_sync_failures(pool: &PgPool) -> sqlx::Result<Vec<SyncFailureRow>> {
    sqlx::query_as::<_, SyncFailureRow>(
        r#"
        select id, collection, entity_id, operation, last_error, retry_count, created_at
        from warehouse.sync_failures
        order by created_at, id
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn delete_sync_failure(pool: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("delete from warehouse.sync_failures where id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Moves a failure into dead-letter storage.
///
/// The dead-letter insert is an upsert on the failure id, so concurrent workers
/// dead-lettering the same failure converge on one row.
pub async fn move_to_dead_letter(pool: &PgPool, row: &SyncFailureRow) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        insert into warehouse.dead_letters
            (id, collection, entity_id, operation, last_error, retry_count, created_at)
        values ($1, $2, $3, $4, $5, $6, $7)
        on conflict (id) do update
        set last_error = excluded.last_error,
            retry_count = excluded.retry_count
        "#,
    )
    .bind(row.id)
    .bind(&row.collection)
    .bind(&row.entity_id)
    .bind(row.operation)
    .bind(&row.last_error)
    .bind(row.retry_count)
    .bind(row.created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("delete from warehouse.sync_failures where id = $1")
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

pub async fn get_dead_letters(pool: &PgPool) -> sqlx::Result<Vec<DeadLetterRow>> {
    sqlx::query_as::<_, DeadLetterRow>(
        r#"
        select id, collection, entity_id, operation, last_error, retry_count, created_at,
               dead_lettered_at
        from warehouse.dead_letters
        order by created_at, id
        "#,
    )
    .fetch_all(pool)
    .await
}
