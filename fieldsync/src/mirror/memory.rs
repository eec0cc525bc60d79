use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::mirror::Warehouse;
use crate::types::{ChangeEvent, ChangeOperation, DeadLetterRecord, Document, SyncFailure};

/// Current state of one mirrored entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionRow {
    pub data: Option<Document>,
    pub is_deleted: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    events: Vec<ChangeEvent>,
    event_keys: HashSet<(String, String, DateTime<Utc>)>,
    projection: HashMap<(String, String), ProjectionRow>,
    failures: BTreeMap<Uuid, SyncFailure>,
    dead_letters: BTreeMap<Uuid, DeadLetterRecord>,
}

/// In-memory warehouse.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn projection(&self, collection: &str, entity_id: &str) -> Option<ProjectionRow> {
        let inner = self.inner.lock().await;

        inner
            .projection
            .get(&(collection.to_string(), entity_id.to_string()))
            .cloned()
    }

    pub async fn events(&self) -> Vec<ChangeEvent> {
        self.inner.lock().await.events.clone()
    }
}

fn oldest_first(failures: impl Iterator<Item = SyncFailure>) -> Vec<SyncFailure> {
    let mut failures: Vec<SyncFailure> = failures.collect();
    failures.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    failures
}

impl Warehouse for MemoryWarehouse {
    async fn apply_event(&self, event: &ChangeEvent) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        let event_key = (
            event.collection.clone(),
            event.entity_id.clone(),
            event.timestamp,
        );
        if inner.event_keys.insert(event_key) {
            inner.events.push(event.clone());
        }

        let projection_key = (event.collection.clone(), event.entity_id.clone());
        if let Some(existing) = inner.projection.get(&projection_key)
            && existing.updated_at > event.timestamp
        {
            return Ok(());
        }

        let row = match event.operation {
            ChangeOperation::Delete => ProjectionRow {
                data: inner
                    .projection
                    .get(&projection_key)
                    .and_then(|row| row.data.clone())
                    .or_else(|| event.before.clone()),
                is_deleted: true,
                updated_at: event.timestamp,
            },
            ChangeOperation::Create | ChangeOperation::Update => ProjectionRow {
                data: event.after.clone(),
                is_deleted: false,
                updated_at: event.timestamp,
            },
        };
        inner.projection.insert(projection_key, row);

        Ok(())
    }

    async fn record_failure(&self, failure: &SyncFailure) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        let entry = inner
            .failures
            .entry(failure.id)
            .or_insert_with(|| failure.clone());
        entry.last_error = failure.last_error.clone();
        entry.retry_count = entry.retry_count.max(failure.retry_count);

        Ok(())
    }

    async fn retryable_failures(
        &self,
        created_after: DateTime<Utc>,
        max_attempts: u32,
        limit: usize,
    ) -> SyncResult<Vec<SyncFailure>> {
        let inner = self.inner.lock().await;

        let mut failures = oldest_first(
            inner
                .failures
                .values()
                .filter(|f| f.retry_count < max_attempts && f.created_at > created_after)
                .cloned(),
        );
        failures.truncate(limit);

        Ok(failures)
    }

    async fn remove_failure(&self, id: Uuid) -> SyncResult<()> {
        self.inner.lock().await.failures.remove(&id);

        Ok(())
    }

    async fn dead_letter(&self, failure: &SyncFailure) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        let dead_lettered_at = inner
            .dead_letters
            .get(&failure.id)
            .map(|existing| existing.dead_lettered_at)
            .unwrap_or_else(Utc::now);
        inner.dead_letters.insert(
            failure.id,
            DeadLetterRecord {
                failure: failure.clone(),
                dead_lettered_at,
            },
        );
        inner.failures.remove(&failure.id);

        Ok(())
    }

    async fn failures(&self) -> SyncResult<Vec<SyncFailure>> {
        let inner = self.inner.lock().await;

        Ok(oldest_first(inner.failures.values().cloned()))
    }

    async fn dead_letters(&self) -> SyncResult<Vec<DeadLetterRecord>> {
        let inner = self.inner.lock().await;

        Ok(inner.dead_letters.values().cloned().collect())
    }

    async fn event_count(&self) -> SyncResult<u64> {
        Ok(self.inner.lock().await.events.len() as u64)
    }
}
