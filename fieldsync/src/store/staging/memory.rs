use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::SyncResult;
use crate::store::staging::StagingStore;
use crate::store::staging::base::page_from;
use crate::types::{PageCursor, StagingPage, StagingRecord, StatusFilter};

/// In-memory staging store ordered by record id.
#[derive(Debug, Clone, Default)]
pub struct MemoryStaging {
    records: Arc<Mutex<BTreeMap<String, StagingRecord>>>,
}

impl MemoryStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `records`.
    pub fn with_records(records: impl IntoIterator<Item = StagingRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Loads a JSON array of `{ "id": ..., "attributes": {...} }` records.
    pub async fn from_json_file(path: &Path) -> SyncResult<Self> {
        let raw = tokio::fs::read(path).await?;
        let records: Vec<StagingRecord> = serde_json::from_slice(&raw)?;
        info!(path = %path.display(), records = records.len(), "seeded memory staging store");

        Ok(Self::with_records(records))
    }

    /// Ingests records. Existing ids are left untouched.
    pub async fn insert(&self, records: impl IntoIterator<Item = StagingRecord>) -> usize {
        let mut inner = self.records.lock().await;
        let mut inserted = 0;

        for record in records {
            if !inner.contains_key(&record.id) {
                inner.insert(record.id.clone(), record);
                inserted += 1;
            }
        }

        inserted
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

impl StagingStore for MemoryStaging {
    async fn fetch_page(
        &self,
        filter: &StatusFilter,
        after: Option<&PageCursor>,
        limit: usize,
    ) -> SyncResult<StagingPage> {
        let inner = self.records.lock().await;

        let records: Vec<StagingRecord> = inner
            .values()
            .filter(|record| after.is_none_or(|cursor| record.id.as_str() > cursor.as_str()))
            .filter(|record| filter.matches(record))
            .take(limit)
            .cloned()
            .collect();

        Ok(page_from(records, limit))
    }

    async fn records_for_key(
        &self,
        key_fields: &[String],
        key: &str,
    ) -> SyncResult<Vec<StagingRecord>> {
        let inner = self.records.lock().await;

        Ok(inner
            .values()
            .filter(|record| {
                key_fields
                    .iter()
                    .any(|field| record.attribute_str(field).as_deref() == Some(key))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::fixtures::record;

    fn approved() -> StatusFilter {
        StatusFilter {
            field: "status".to_string(),
            values: vec!["Approved".to_string()],
        }
    }

    #[tokio::test]
    async fn pages_follow_id_order_and_end_with_no_cursor() {
        let store = MemoryStaging::with_records(vec![
            record("003", json!({ "poleNumber": "P-3", "status": "Approved" })),
            record("001", json!({ "poleNumber": "P-1", "status": "Approved" })),
            record("002", json!({ "poleNumber": "P-2", "status": "Requested" })),
            record("004", json!({ "poleNumber": "P-4", "status": "Approved" })),
        ]);

        let first = store.fetch_page(&approved(), None, 2).await.unwrap();
        let ids: Vec<_> = first.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["001", "003"]);

        let cursor = first.next_cursor.unwrap();
        let second = store.fetch_page(&approved(), Some(&cursor), 2).await.unwrap();
        let ids: Vec<_> = second.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["004"]);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn padded_status_values_still_match_the_filter() {
        let store = MemoryStaging::with_records(vec![
            record("001", json!({ "poleNumber": "P-1", "status": "  Approved " })),
            record("002", json!({ "poleNumber": "P-2", "status": "Approved\n" })),
            record("003", json!({ "poleNumber": "P-3", "status": " Requested" })),
        ]);

        let page = store.fetch_page(&approved(), None, 10).await.unwrap();

        let ids: Vec<_> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["001", "002"]);
    }

    #[tokio::test]
    async fn records_for_key_ignores_the_status_filter() {
        let store = MemoryStaging::with_records(vec![
            record("001", json!({ "poleNumber": "P-1", "status": "Requested" })),
            record("002", json!({ "pole_number": "P-1", "status": "Approved" })),
            record("003", json!({ "poleNumber": "P-2", "status": "Approved" })),
        ]);
        let fields = vec!["poleNumber".to_string(), "pole_number".to_string()];

        let records = store.records_for_key(&fields, "P-1").await.unwrap();

        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn insert_keeps_staging_immutable() {
        let store = MemoryStaging::new();
        let first = store
            .insert(vec![record("001", json!({ "status": "Requested" }))])
            .await;
        let second = store
            .insert(vec![record("001", json!({ "status": "Changed" }))])
            .await;

        assert_eq!((first, second), (1, 0));
        let page = store
            .fetch_page(
                &StatusFilter {
                    field: "status".to_string(),
                    values: vec!["Requested".to_string()],
                },
                None,
                10,
            )
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
    }
}
