use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Create => "create",
            ChangeOperation::Update => "update",
            ChangeOperation::Delete => "delete",
        }
    }
}

/// A captured production write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Collection tag, e.g. `planned-poles` or `planned-poles/statusHistory`.
    pub collection: String,
    pub entity_id: String,
    pub operation: ChangeOperation,
    pub before: Option<Document>,
    pub after: Option<Document>,
    pub timestamp: DateTime<Utc>,
}

/// A change event that could not be applied to the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncFailure {
    pub id: Uuid,
    pub collection: String,
    pub entity_id: String,
    pub operation: ChangeOperation,
    pub last_error: String,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl SyncFailure {
    /// Records a first failure for `event`.
    pub fn from_event(event: &ChangeEvent, error: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection: event.collection.clone(),
            entity_id: event.entity_id.clone(),
            operation: event.operation,
            last_error: error.into(),
            retry_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// A failure that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLetterRecord {
    pub failure: SyncFailure,
    pub dead_lettered_at: DateTime<Utc>,
}
