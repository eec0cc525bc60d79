use fieldsync_postgres::staging::{
    StagingRecordRow, fetch_staging_page, fetch_staging_records_for_key, insert_staging_records,
};
use sqlx::PgPool;

use crate::error::{ErrorKind, SyncResult};
use crate::store::staging::StagingStore;
use crate::store::staging::base::page_from;
use crate::store::{into_document, store_error};
use crate::types::{PageCursor, StagingPage, StagingRecord, StatusFilter};

/// Staging store backed by the `fieldsync.staging_records` table.
#[derive(Debug, Clone)]
pub struct PostgresStaging {
    pool: PgPool,
}

impl PostgresStaging {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ingests records, ignoring ids that already exist.
    pub async fn insert(&self, records: &[StagingRecord]) -> SyncResult<u64> {
        let rows: Vec<StagingRecordRow> = records
            .iter()
            .map(|record| StagingRecordRow {
                id: record.id.clone(),
                attributes: serde_json::Value::Object(record.attributes.clone()),
            })
            .collect();

        insert_staging_records(&self.pool, &rows)
            .await
            .map_err(|err| store_error(err, ErrorKind::StagingQueryFailed))
    }
}

fn into_record(row: StagingRecordRow) -> SyncResult<StagingRecord> {
    let context = format!("staging record {}", row.id);
    let attributes = into_document(row.attributes, &context)?;

    Ok(StagingRecord::new(row.id, attributes))
}

impl StagingStore for PostgresStaging {
    async fn fetch_page(
        &self,
        filter: &StatusFilter,
        after: Option<&PageCursor>,
        limit: usize,
    ) -> SyncResult<StagingPage> {
        let rows = fetch_staging_page(
            &self.pool,
            &filter.field,
            &filter.values,
            after.map(PageCursor::as_str),
            limit as i64,
        )
        .await
        .map_err(|err| store_error(err, ErrorKind::StagingQueryFailed))?;

        let records = rows
            .into_iter()
            .map(into_record)
            .collect::<SyncResult<Vec<_>>>()?;

        Ok(page_from(records, limit))
    }

    async fn records_for_key(
        &self,
        key_fields: &[String],
        key: &str,
    ) -> SyncResult<Vec<StagingRecord>> {
        let rows = fetch_staging_records_for_key(&self.pool, key_fields, key)
            .await
            .map_err(|err| store_error(err, ErrorKind::StagingQueryFailed))?;

        rows.into_iter().map(into_record).collect()
    }
}
