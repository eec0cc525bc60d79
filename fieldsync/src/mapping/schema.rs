use std::fmt;

use fieldsync_config::shared::SnapshotFieldsConfig;
use serde_json::Value;

use crate::mapping::coerce::split_list;
use crate::types::{ChangeDate, RawSnapshot, StagingRecord, scalar_to_string};

/// A staging record that carries none of the natural key fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingKey {
    pub snapshot_id: String,
    pub tried_fields: Vec<String>,
    pub import_batch: Option<String>,
    pub source_file: Option<String>,
}

impl fmt::Display for MissingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record {} has no natural key (tried {})",
            self.snapshot_id,
            self.tried_fields.join(", ")
        )?;
        if let Some(batch) = &self.import_batch {
            write!(f, ", import batch {batch}")?;
        }
        if let Some(file) = &self.source_file {
            write!(f, ", source file {file}")?;
        }

        Ok(())
    }
}

/// Names the staging attributes that carry each snapshot field.
#[derive(Debug, Clone)]
pub struct SnapshotSchema {
    fields: SnapshotFieldsConfig,
}

impl SnapshotSchema {
    pub fn new(fields: SnapshotFieldsConfig) -> Self {
        Self { fields }
    }

    /// Natural key source fields in fallback order.
    pub fn natural_key_fields(&self) -> &[String] {
        &self.fields.natural_key
    }

    pub fn status_field(&self) -> &str {
        &self.fields.status
    }

    /// Resolves the natural key from the first populated key field.
    pub fn natural_key(&self, record: &StagingRecord) -> Option<String> {
        self.fields
            .natural_key
            .iter()
            .find_map(|field| record.attribute_str(field))
    }

    /// Extracts a [`RawSnapshot`], or reports the record as [`MissingKey`].
    pub fn extract(&self, record: &StagingRecord) -> Result<RawSnapshot, MissingKey> {
        let fields = &self.fields;
        let text = |field: &str| record.attribute_str(field);

        let Some(natural_key) = self.natural_key(record) else {
            return Err(MissingKey {
                snapshot_id: record.id.clone(),
                tried_fields: fields.natural_key.clone(),
                import_batch: text(&fields.import_batch),
                source_file: text(&fields.source_file),
            });
        };

        Ok(RawSnapshot {
            id: record.id.clone(),
            natural_key,
            subject_id: text(&fields.subject_id),
            status: text(&fields.status),
            change_date: text(&fields.change_date).map(ChangeDate::parse),
            change_index: record.attributes.get(&fields.change_index).and_then(as_i64),
            last_modified: text(&fields.last_modified_date).map(ChangeDate::parse),
            agent: text(&fields.agent),
            location_address: text(&fields.location_address),
            latitude: record.attributes.get(&fields.latitude).and_then(as_f64),
            longitude: record.attributes.get(&fields.longitude).and_then(as_f64),
            auxiliary_id: text(&fields.auxiliary_id),
            workflow_groups: record
                .attributes
                .get(&fields.workflow_groups)
                .map(as_list)
                .unwrap_or_default(),
            import_batch: text(&fields.import_batch),
            source_file: text(&fields.source_file),
            attributes: record.attributes.clone(),
        })
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other)
            .map(|raw| split_list(&raw))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::fixtures::record;

    fn schema() -> SnapshotSchema {
        SnapshotSchema::new(SnapshotFieldsConfig::default())
    }

    #[test]
    fn natural_key_falls_back_through_alternate_fields() {
        let primary = record("r1", json!({ "poleNumber": "P-1", "pole_number": "P-9" }));
        let fallback = record("r2", json!({ "poleNumber": "", "PoleNumber": "P-2" }));

        assert_eq!(schema().natural_key(&primary).as_deref(), Some("P-1"));
        assert_eq!(schema().natural_key(&fallback).as_deref(), Some("P-2"));
    }

    #[test]
    fn missing_key_reports_provenance() {
        let orphan = record(
            "r3",
            json!({ "status": "Requested", "importBatch": "2025-05-01", "sourceFile": "may.csv" }),
        );

        let err = schema().extract(&orphan).unwrap_err();
        assert_eq!(err.snapshot_id, "r3");
        assert_eq!(err.source_file.as_deref(), Some("may.csv"));
        assert!(err.to_string().contains("poleNumber, pole_number, PoleNumber"));
    }

    #[test]
    fn extracts_typed_snapshot_fields() {
        let raw = record(
            "r4",
            json!({
                "poleNumber": "P-4",
                "status": "Pole Permission: Approved",
                "dateStatusChanged": "2025-04-30 10:15:00",
                "changeIndex": "3",
                "latitude": "-26.1",
                "longitude": 28.05,
                "flowNameGroups": "Planning, Pole Permissions",
            }),
        );

        let snapshot = schema().extract(&raw).unwrap();
        assert_eq!(snapshot.natural_key, "P-4");
        assert_eq!(snapshot.change_index, Some(3));
        assert_eq!(snapshot.latitude, Some(-26.1));
        assert_eq!(snapshot.longitude, Some(28.05));
        assert_eq!(
            snapshot.workflow_groups,
            vec!["Planning".to_string(), "Pole Permissions".to_string()]
        );
        assert!(snapshot.change_date.unwrap().instant().is_some());
    }
}
