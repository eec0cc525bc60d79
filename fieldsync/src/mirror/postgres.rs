use chrono::{DateTime, Utc};
use fieldsync_postgres::warehouse::{
    self, ChangeEventRow, DeadLetterRow, SyncFailureRow, apply_change_event, count_events,
    delete_sync_failure, get_dead_letters, get_retryable_failures, get_sync_failures,
    move_to_dead_letter, upsert_sync_failure,
};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ErrorKind, SyncResult};
use crate::mirror::Warehouse;
use crate::store::store_error;
use crate::types::{ChangeEvent, ChangeOperation, DeadLetterRecord, SyncFailure};

/// Warehouse backed by the `warehouse` schema.
#[derive(Debug, Clone)]
pub struct PostgresWarehouse {
    pool: PgPool,
}

impl PostgresWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<ChangeOperation> for warehouse::ChangeOperation {
    fn from(operation: ChangeOperation) -> Self {
        match operation {
            ChangeOperation::Create => warehouse::ChangeOperation::Create,
            ChangeOperation::Update => warehouse::ChangeOperation::Update,
            ChangeOperation::Delete => warehouse::ChangeOperation::Delete,
        }
    }
}

impl From<warehouse::ChangeOperation> for ChangeOperation {
    fn from(operation: warehouse::ChangeOperation) -> Self {
        match operation {
            warehouse::ChangeOperation::Create => ChangeOperation::Create,
            warehouse::ChangeOperation::Update => ChangeOperation::Update,
            warehouse::ChangeOperation::Delete => ChangeOperation::Delete,
        }
    }
}

impl From<&SyncFailure> for SyncFailureRow {
    fn from(failure: &SyncFailure) -> Self {
        SyncFailureRow {
            id: failure.id,
            collection: failure.collection.clone(),
            entity_id: failure.entity_id.clone(),
            operation: failure.operation.into(),
            last_error: failure.last_error.clone(),
            retry_count: i32::try_from(failure.retry_count).unwrap_or(i32::MAX),
            created_at: failure.created_at,
        }
    }
}

impl From<SyncFailureRow> for SyncFailure {
    fn from(row: SyncFailureRow) -> Self {
        SyncFailure {
            id: row.id,
            collection: row.collection,
            entity_id: row.entity_id,
            operation: row.operation.into(),
            last_error: row.last_error,
            retry_count: row.retry_count.max(0) as u32,
            created_at: row.created_at,
        }
    }
}

impl From<DeadLetterRow> for DeadLetterRecord {
    fn from(row: DeadLetterRow) -> Self {
        DeadLetterRecord {
            failure: row.failure.into(),
            dead_lettered_at: row.dead_lettered_at,
        }
    }
}

fn warehouse_error(err: sqlx::Error) -> crate::error::SyncError {
    store_error(err, ErrorKind::WarehouseQueryFailed)
}

impl Warehouse for PostgresWarehouse {
    async fn apply_event(&self, event: &ChangeEvent) -> SyncResult<()> {
        let row = ChangeEventRow {
            collection: event.collection.clone(),
            entity_id: event.entity_id.clone(),
            operation: event.operation.into(),
            data: event.after.clone().map(Value::Object),
            previous_data: event.before.clone().map(Value::Object),
            event_timestamp: event.timestamp,
        };

        apply_change_event(&self.pool, &row)
            .await
            .map_err(|err| store_error(err, ErrorKind::MirrorWriteFailure))
    }

    async fn record_failure(&self, failure: &SyncFailure) -> SyncResult<()> {
        upsert_sync_failure(&self.pool, &SyncFailureRow::from(failure))
            .await
            .map_err(warehouse_error)
    }

    async fn retryable_failures(
        &self,
        created_after: DateTime<Utc>,
        max_attempts: u32,
        limit: usize,
    ) -> SyncResult<Vec<SyncFailure>> {
        let rows = get_retryable_failures(
            &self.pool,
            created_after,
            i32::try_from(max_attempts).unwrap_or(i32::MAX),
            limit as i64,
        )
        .await
        .map_err(warehouse_error)?;

        Ok(rows.into_iter().map(SyncFailure::from).collect())
    }

    async fn remove_failure(&self, id: Uuid) -> SyncResult<()> {
        delete_sync_failure(&self.pool, id)
            .await
            .map_err(warehouse_error)
    }

    async fn dead_letter(&self, failure: &SyncFailure) -> SyncResult<()> {
        move_to_dead_letter(&self.pool, &SyncFailureRow::from(failure))
            .await
            .map_err(warehouse_error)
    }

    async fn failures(&self) -> SyncResult<Vec<SyncFailure>> {
        let rows = get_sync_failures(&self.pool).await.map_err(warehouse_error)?;

        Ok(rows.into_iter().map(SyncFailure::from).collect())
    }

    async fn dead_letters(&self) -> SyncResult<Vec<DeadLetterRecord>> {
        let rows = get_dead_letters(&self.pool).await.map_err(warehouse_error)?;

        Ok(rows.into_iter().map(DeadLetterRecord::from).collect())
    }

    async fn event_count(&self) -> SyncResult<u64> {
        let count = count_events(&self.pool).await.map_err(warehouse_error)?;

        Ok(count.max(0) as u64)
    }
}
