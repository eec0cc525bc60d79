use fieldsync_postgres::entities::{
    HistoryRow, WriteRow, apply_write_batch, count_entities, count_history_entries, get_entity,
    get_history, get_history_entry, get_keys_by_source,
};
use serde_json::Value;
use sqlx::PgPool;

use crate::error::{ErrorKind, SyncResult};
use crate::store::destination::{DestinationStore, StoredHistoryEntry};
use crate::store::{into_document, store_error};
use crate::types::{Document, WriteBatch, WriteOp};

/// Destination store backed by `fieldsync.entities` and `fieldsync.entity_history`.
#[derive(Debug, Clone)]
pub struct PostgresDestination {
    pool: PgPool,
}

impl PostgresDestination {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_history_entry(row: HistoryRow) -> SyncResult<StoredHistoryEntry> {
    let context = format!("history entry {}/{}", row.natural_key, row.entry_id);

    Ok(StoredHistoryEntry {
        sequence: u32::try_from(row.sequence).unwrap_or(u32::MAX),
        document: into_document(row.document, &context)?,
        entry_id: row.entry_id,
    })
}

fn into_write_row(op: &WriteOp) -> WriteRow {
    match op {
        WriteOp::UpsertEntity {
            natural_key,
            document,
        } => WriteRow::UpsertEntity {
            natural_key: natural_key.clone(),
            document: Value::Object(document.clone()),
        },
        WriteOp::UpsertHistory {
            natural_key,
            entry_id,
            sequence,
            document,
        } => WriteRow::UpsertHistory {
            natural_key: natural_key.clone(),
            entry_id: entry_id.clone(),
            sequence: i64::from(*sequence),
            document: Value::Object(document.clone()),
        },
    }
}

impl DestinationStore for PostgresDestination {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn get_entity(&self, natural_key: &str) -> SyncResult<Option<Document>> {
        let row = get_entity(&self.pool, natural_key)
            .await
            .map_err(|err| store_error(err, ErrorKind::DestinationQueryFailed))?;

        row.map(|row| into_document(row.document, &format!("entity {}", row.natural_key)))
            .transpose()
    }

    async fn keys_by_source(&self, source_tag: &str) -> SyncResult<Vec<String>> {
        get_keys_by_source(&self.pool, source_tag)
            .await
            .map_err(|err| store_error(err, ErrorKind::DestinationQueryFailed))
    }

    async fn count_entities(&self) -> SyncResult<u64> {
        let count = count_entities(&self.pool)
            .await
            .map_err(|err| store_error(err, ErrorKind::DestinationQueryFailed))?;

        Ok(count.max(0) as u64)
    }

    async fn count_history_entries(&self) -> SyncResult<u64> {
        let count = count_history_entries(&self.pool)
            .await
            .map_err(|err| store_error(err, ErrorKind::DestinationQueryFailed))?;

        Ok(count.max(0) as u64)
    }

    async fn history(&self, natural_key: &str) -> SyncResult<Vec<StoredHistoryEntry>> {
        let rows = get_history(&self.pool, natural_key)
            .await
            .map_err(|err| store_error(err, ErrorKind::DestinationQueryFailed))?;

        rows.into_iter().map(into_history_entry).collect()
    }

    async fn get_history_entry(
        &self,
        natural_key: &str,
        entry_id: &str,
    ) -> SyncResult<Option<StoredHistoryEntry>> {
        let row = get_history_entry(&self.pool, natural_key, entry_id)
            .await
            .map_err(|err| store_error(err, ErrorKind::DestinationQueryFailed))?;

        row.map(into_history_entry).transpose()
    }

    async fn commit(&self, batch: &WriteBatch) -> SyncResult<()> {
        let rows: Vec<WriteRow> = batch.ops().iter().map(into_write_row).collect();

        apply_write_batch(&self.pool, &rows)
            .await
            .map_err(|err| store_error(err, ErrorKind::CommitFailure))
    }
}
