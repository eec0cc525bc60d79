use std::future::Future;

use crate::error::SyncResult;
use crate::types::{PageCursor, StagingPage, StagingRecord, StatusFilter};

/// Read access to the write-heavy staging store.
///
/// Staging records are immutable once ingested and are addressed in primary key order.
pub trait StagingStore {
    /// Returns up to `limit` records matching `filter`, strictly after `after`.
    ///
    /// The returned cursor is [`None`] once no further matching records exist.
    fn fetch_page(
        &self,
        filter: &StatusFilter,
        after: Option<&PageCursor>,
        limit: usize,
    ) -> impl Future<Output = SyncResult<StagingPage>> + Send;

    /// Returns every record, regardless of status, where one of `key_fields` holds `key`.
    ///
    /// The result may contain records whose natural key resolves to another value
    /// through a higher priority field. Callers filter by the resolved key.
    fn records_for_key(
        &self,
        key_fields: &[String],
        key: &str,
    ) -> impl Future<Output = SyncResult<Vec<StagingRecord>>> + Send;
}

/// Builds the page returned for `records` fetched with `limit`.
pub(super) fn page_from(records: Vec<StagingRecord>, limit: usize) -> StagingPage {
    let next_cursor = if records.len() < limit {
        None
    } else {
        records.last().map(|record| PageCursor::new(record.id.clone()))
    };

    StagingPage {
        records,
        next_cursor,
    }
}
