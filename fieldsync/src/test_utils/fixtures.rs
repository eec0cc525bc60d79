use chrono::Utc;
use fieldsync_config::shared::{FieldsyncConfig, SnapshotFieldsConfig};
use serde_json::{Value, json};

use crate::mapping::SnapshotSchema;
use crate::types::{
    ChangeEvent, ChangeOperation, Document, EntityWrite, HistoryEntry, INITIAL_STATUS,
    RawSnapshot, StagingRecord, history_entry_id,
};

/// Status that marks an approval under the default configuration.
pub const APPROVED: &str = "Pole Permission: Approved";

/// Converts a JSON object literal into a [`Document`].
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn record(id: &str, attributes: Value) -> StagingRecord {
    StagingRecord::new(id, document(attributes))
}

/// Extracts a snapshot with the default field names.
///
/// # Panics
///
/// Panics if the attributes carry no natural key.
pub fn snapshot_from(id: &str, attributes: Value) -> RawSnapshot {
    SnapshotSchema::new(SnapshotFieldsConfig::default())
        .extract(&record(id, attributes))
        .unwrap()
}

/// A write for `natural_key` with `history_len` distinct history entries.
pub fn entity_write(natural_key: &str, history_len: usize) -> EntityWrite {
    let history = (0..history_len)
        .map(|i| {
            let change_date = format!("2025-01-{:02}", i + 1);
            let to_status = format!("Status {i}");
            HistoryEntry {
                id: history_entry_id(Some(&change_date), i as i64, &to_status),
                sequence: i as u32,
                from_status: if i == 0 {
                    INITIAL_STATUS.to_string()
                } else {
                    format!("Status {}", i - 1)
                },
                to_status,
                change_date: Some(change_date),
                change_index: i as i64,
                agent: None,
                subject_id: None,
                auxiliary_id: None,
                location_address: None,
                source_snapshot_id: format!("{natural_key}-r{i}"),
                days_in_previous_status: None,
                post_approval: false,
                import_batch: None,
                source_file: None,
            }
        })
        .collect();

    EntityWrite {
        natural_key: natural_key.to_string(),
        document: document(json!({
            "poleNumber": natural_key,
            "lastSyncedFrom": "vf-onemap-data",
        })),
        history,
    }
}

/// A create event stamped with the current time.
pub fn change_event(collection: &str, entity_id: &str, after: Document) -> ChangeEvent {
    ChangeEvent {
        collection: collection.to_string(),
        entity_id: entity_id.to_string(),
        operation: ChangeOperation::Create,
        before: None,
        after: Some(after),
        timestamp: Utc::now(),
    }
}

/// A configuration with every section defaulted, backed by memory stores.
pub fn config(pipeline: &str) -> FieldsyncConfig {
    serde_json::from_value(json!({ "pipeline": { "name": pipeline } })).unwrap()
}

/// Three snapshots of pole `P-100`: one request and the same approval ingested twice.
pub fn p100_records() -> Vec<StagingRecord> {
    vec![
        record(
            "r1",
            json!({
                "poleNumber": "P-100",
                "propertyId": "prop-1",
                "status": "Pole Permission: Requested",
                "dateStatusChanged": "2025-01-01",
                "changeIndex": 0,
                "fieldAgentName": "agent-a",
            }),
        ),
        record(
            "r2",
            json!({
                "poleNumber": "P-100",
                "propertyId": "prop-1",
                "status": APPROVED,
                "dateStatusChanged": "2025-01-02",
                "changeIndex": 1,
                "fieldAgentName": "agent-a",
            }),
        ),
        record(
            "r3",
            json!({
                "poleNumber": "P-100",
                "propertyId": "prop-1",
                "status": APPROVED,
                "dateStatusChanged": "2025-01-02",
                "changeIndex": 1,
                "fieldAgentName": "agent-b",
            }),
        ),
    ]
}
