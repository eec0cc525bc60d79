use serde::Serialize;

use crate::types::{Document, HistoryEntry};

/// Metadata block written under `syncMetadata` on every synced entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    pub sync_type: String,
    pub source_system: String,
    pub total_status_changes: usize,
    pub has_post_approval_statuses: bool,
}

impl SyncMetadata {
    pub fn to_document(&self) -> Document {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // Strings, a count and a flag always serialize to an object.
            _ => Document::new(),
        }
    }
}

/// Everything the coordinator writes for one natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityWrite {
    pub natural_key: String,
    /// Canonical entity document, merged into the destination.
    pub document: Document,
    /// History entries in reconstruction order.
    pub history: Vec<HistoryEntry>,
}

impl EntityWrite {
    /// Number of write operations this key needs.
    pub fn operation_count(&self) -> usize {
        self.history.len() + 1
    }
}
