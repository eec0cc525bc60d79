use fieldsync_config::shared::{CoercionKind, MappingConfig};
use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::mapping::coerce::coerce;
use crate::types::{Document, RawSnapshot};

/// One source attribute copied to a (possibly nested) destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub destination: Vec<String>,
    pub coercion: CoercionKind,
}

/// A mapped field that had to be omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingIssue {
    pub natural_key: String,
    pub snapshot_id: String,
    pub source_field: String,
    pub raw_value: Value,
    pub reason: String,
}

/// Result of mapping one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedDocument {
    pub document: Document,
    pub issues: Vec<MappingIssue>,
}

/// Declarative source to destination mapping validated at startup.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    mappings: Vec<FieldMapping>,
    key_field: String,
}

impl FieldMapper {
    /// Builds a mapper from configuration, rejecting invalid tables.
    pub fn from_config(config: &MappingConfig) -> SyncResult<FieldMapper> {
        if let Err(err) = config.validate() {
            bail!(
                ErrorKind::InvalidMapping,
                "Invalid field mapping table",
                err.to_string()
            );
        }

        let mappings = config
            .fields
            .iter()
            .map(|field| FieldMapping {
                source: field.source.clone(),
                destination: field.destination.split('.').map(str::to_string).collect(),
                coercion: field.coercion,
            })
            .collect();

        Ok(FieldMapper {
            mappings,
            key_field: config.destination_key_field.clone(),
        })
    }

    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    /// Destination field holding the natural key.
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Maps a snapshot to a partial destination document.
    ///
    /// Absent and null source fields are omitted. Fields that fail coercion are
    /// omitted and returned as issues. The natural key is always written.
    pub fn map(&self, snapshot: &RawSnapshot) -> MappedDocument {
        let mut mapped = MappedDocument::default();

        for mapping in &self.mappings {
            let Some(value) = snapshot.attributes.get(&mapping.source) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            match coerce(value, mapping.coercion) {
                Ok(coerced) => set_path(&mut mapped.document, &mapping.destination, coerced),
                Err(err) => mapped.issues.push(MappingIssue {
                    natural_key: snapshot.natural_key.clone(),
                    snapshot_id: snapshot.id.clone(),
                    source_field: mapping.source.clone(),
                    raw_value: value.clone(),
                    reason: err.to_string(),
                }),
            }
        }

        mapped.document.insert(
            self.key_field.clone(),
            Value::String(snapshot.natural_key.clone()),
        );

        mapped
    }
}

fn set_path(document: &mut Document, path: &[String], value: Value) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };

    let mut current = document;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Document::new()));
        if !entry.is_object() {
            *entry = Value::Object(Document::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }

    current.insert(leaf.clone(), value);
}

#[cfg(test)]
mod tests {
    use fieldsync_config::shared::FieldMappingConfig;
    use serde_json::json;

    use super::*;
    use crate::test_utils::fixtures::snapshot_from;

    #[test]
    fn maps_nested_paths_with_coercion() {
        let mapper = FieldMapper::from_config(&MappingConfig::default()).unwrap();
        let snapshot = snapshot_from(
            "r1",
            json!({
                "poleNumber": "P-100",
                "latitude": "-26.2041",
                "longitude": "28.0473",
                "locationAddress": "12 Main Rd",
                "status": "Pole Permission: Approved",
                "site": null,
            }),
        );

        let mapped = mapper.map(&snapshot);

        assert!(mapped.issues.is_empty());
        assert_eq!(
            Value::Object(mapped.document),
            json!({
                "poleNumber": "P-100",
                "location": { "latitude": -26.2041, "longitude": 28.0473 },
                "address": "12 Main Rd",
                "importStatus": "Pole Permission: Approved",
            })
        );
    }

    #[test]
    fn coercion_failures_are_reported_and_omitted() {
        let mapper = FieldMapper::from_config(&MappingConfig::default()).unwrap();
        let snapshot = snapshot_from(
            "r2",
            json!({ "poleNumber": "P-2", "latitude": "unknown", "longitude": 28.1 }),
        );

        let mapped = mapper.map(&snapshot);

        assert_eq!(mapped.issues.len(), 1);
        assert_eq!(mapped.issues[0].source_field, "latitude");
        assert_eq!(mapped.issues[0].snapshot_id, "r2");
        assert_eq!(mapped.document["location"], json!({ "longitude": 28.1 }));
    }

    #[test]
    fn natural_key_uses_the_resolved_fallback() {
        let mapper = FieldMapper::from_config(&MappingConfig::default()).unwrap();
        let snapshot = snapshot_from("r3", json!({ "pole_number": "P-3" }));

        let mapped = mapper.map(&snapshot);

        assert_eq!(mapped.document["poleNumber"], "P-3");
    }

    #[test]
    fn invalid_tables_are_rejected_at_startup() {
        let mut config = MappingConfig::default();
        config.fields.push(FieldMappingConfig {
            source: "extra".to_string(),
            destination: "location".to_string(),
            coercion: CoercionKind::None,
        });

        let err = FieldMapper::from_config(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMapping);
    }
}
