use std::collections::BTreeSet;

use serde::Deserialize;

use crate::shared::ValidationError;

/// How a mapped source value is converted before it lands in the canonical entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionKind {
    /// The value is copied as is.
    #[default]
    None,
    /// Numeric strings become floats.
    Float,
    /// Numeric strings become integers.
    Integer,
    /// `"true"`/`"yes"`/`"1"` style strings become booleans.
    Boolean,
    /// Scalars are rendered as strings.
    String,
    /// Comma separated strings become string arrays.
    StringList,
}

/// A single source-to-destination field rename.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FieldMappingConfig {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub coercion: CoercionKind,
}

impl FieldMappingConfig {
    fn new(source: &str, destination: &str, coercion: CoercionKind) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            coercion,
        }
    }
}

/// Names of the staging attributes that carry snapshot semantics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SnapshotFieldsConfig {
    /// Candidate attribute names for the natural key, tried in order.
    pub natural_key: Vec<String>,
    pub subject_id: String,
    pub status: String,
    pub change_date: String,
    pub change_index: String,
    pub last_modified_date: String,
    pub agent: String,
    pub location_address: String,
    pub latitude: String,
    pub longitude: String,
    pub auxiliary_id: String,
    pub workflow_groups: String,
    pub import_batch: String,
    pub source_file: String,
}

impl Default for SnapshotFieldsConfig {
    fn default() -> Self {
        Self {
            natural_key: vec![
                "poleNumber".to_string(),
                "pole_number".to_string(),
                "PoleNumber".to_string(),
            ],
            subject_id: "propertyId".to_string(),
            status: "status".to_string(),
            change_date: "dateStatusChanged".to_string(),
            change_index: "changeIndex".to_string(),
            last_modified_date: "lastModifiedDate".to_string(),
            agent: "fieldAgentName".to_string(),
            location_address: "locationAddress".to_string(),
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
            auxiliary_id: "dropNumber".to_string(),
            workflow_groups: "flowNameGroups".to_string(),
            import_batch: "importBatch".to_string(),
            source_file: "sourceFile".to_string(),
        }
    }
}

/// Field mapping between staging snapshots and canonical entities.
#[derive(Clone, Debug, Deserialize)]
pub struct MappingConfig {
    #[serde(default)]
    pub snapshot: SnapshotFieldsConfig,
    /// Destination field that receives the natural key.
    #[serde(default = "default_destination_key_field")]
    pub destination_key_field: String,
    /// Ordered field renames applied to the latest snapshot.
    #[serde(default = "default_field_mappings")]
    pub fields: Vec<FieldMappingConfig>,
}

impl MappingConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.snapshot.natural_key.iter().all(|f| f.trim().is_empty()) {
            return Err(ValidationError::EmptyNaturalKeyFields);
        }

        if self.destination_key_field.trim().is_empty() {
            return Err(ValidationError::invalid(
                "mapping.destination_key_field",
                "must not be empty",
            ));
        }

        let mut destinations = BTreeSet::new();
        for field in &self.fields {
            if field.source.is_empty() || field.destination.is_empty() {
                return Err(ValidationError::invalid(
                    "mapping.fields",
                    "source and destination must not be empty",
                ));
            }
            if field.destination.split('.').any(str::is_empty) {
                return Err(ValidationError::invalid(
                    "mapping.fields",
                    &format!("`{}` contains an empty path segment", field.destination),
                ));
            }
            if !destinations.insert(field.destination.as_str()) {
                return Err(ValidationError::invalid(
                    "mapping.fields",
                    &format!("`{}` is mapped more than once", field.destination),
                ));
            }
        }

        // A leaf cannot also be the parent of another destination path.
        for destination in &destinations {
            let prefix = format!("{destination}.");
            if destinations.iter().any(|other| other.starts_with(&prefix)) {
                return Err(ValidationError::invalid(
                    "mapping.fields",
                    &format!("`{destination}` is both a leaf and a parent path"),
                ));
            }
        }

        Ok(())
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            snapshot: SnapshotFieldsConfig::default(),
            destination_key_field: default_destination_key_field(),
            fields: default_field_mappings(),
        }
    }
}

fn default_destination_key_field() -> String {
    "poleNumber".to_string()
}

/// The production field table used by the field-survey import.
pub fn default_field_mappings() -> Vec<FieldMappingConfig> {
    use CoercionKind::*;

    vec![
        FieldMappingConfig::new("poleNumber", "poleNumber", None),
        FieldMappingConfig::new("latitude", "location.latitude", Float),
        FieldMappingConfig::new("longitude", "location.longitude", Float),
        FieldMappingConfig::new("locationAddress", "address", None),
        FieldMappingConfig::new("pons", "ponNumber", None),
        FieldMappingConfig::new("sections", "zoneNumber", None),
        FieldMappingConfig::new("site", "projectName", None),
        FieldMappingConfig::new("status", "importStatus", None),
        FieldMappingConfig::new("flowNameGroups", "workflowGroup", None),
        FieldMappingConfig::new("propertyId", "propertyId", None),
        FieldMappingConfig::new("lastModifiedDate", "lastModifiedInOnemap", None),
        FieldMappingConfig::new("dateStatusChanged", "statusChangeDate", None),
        FieldMappingConfig::new("dropNumber", "dropNumber", None),
        FieldMappingConfig::new("fieldAgentName", "fieldAgent", None),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_field_survey_import() {
        let config = MappingConfig::default();

        assert_eq!(config.destination_key_field, "poleNumber");
        assert_eq!(config.snapshot.natural_key[0], "poleNumber");
        assert!(
            config
                .fields
                .iter()
                .any(|f| f.source == "latitude" && f.destination == "location.latitude")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_natural_key_list_is_rejected() {
        let mut config = MappingConfig::default();
        config.snapshot.natural_key = vec![" ".to_string()];

        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyNaturalKeyFields)
        ));
    }

    #[test]
    fn leaf_and_parent_paths_are_rejected() {
        let mut config = MappingConfig::default();
        config.fields.push(FieldMappingConfig::new(
            "geo",
            "location",
            CoercionKind::None,
        ));

        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_and_empty_segments_are_rejected() {
        let mut config = MappingConfig::default();
        config.fields.push(FieldMappingConfig::new(
            "other",
            "address",
            CoercionKind::None,
        ));
        assert!(config.validate().is_err());

        let mut config = MappingConfig::default();
        config.fields.push(FieldMappingConfig::new(
            "other",
            "extra..field",
            CoercionKind::None,
        ));
        assert!(config.validate().is_err());
    }
}
