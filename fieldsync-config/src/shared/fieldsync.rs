use serde::Deserialize;

use crate::Config;
use crate::shared::{
    BatchConfig, MappingConfig, MirrorConfig, PipelineConfig, StoreConfig, SyncConfig,
    ValidationError,
};

/// Configuration for the fieldsync replicator.
#[derive(Clone, Debug, Deserialize)]
pub struct FieldsyncConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub staging: StoreConfig,
    #[serde(default)]
    pub destination: StoreConfig,
    /// Warehouse mirror store. The mirror is disabled when absent.
    #[serde(default)]
    pub warehouse: Option<StoreConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
}

impl FieldsyncConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pipeline.validate()?;
        self.staging.validate()?;
        self.destination.validate()?;
        if let Some(warehouse) = &self.warehouse {
            warehouse.validate()?;
        }
        self.sync.validate()?;
        self.batch.validate()?;
        self.mapping.validate()?;
        self.mirror.validate()?;

        Ok(())
    }
}

impl Config for FieldsyncConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["sync.status_filter.values"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_uses_defaults() {
        let config: FieldsyncConfig =
            serde_json::from_str(r#"{ "pipeline": { "name": "onemap" } }"#).unwrap();

        assert_eq!(config.pipeline.source_tag, "vf-onemap-data");
        assert_eq!(config.pipeline.history_path(), "planned-poles/statusHistory");
        assert_eq!(config.sync.page_size, 1000);
        assert_eq!(config.batch.max_operations, 500);
        assert_eq!(config.mirror.max_attempts, 3);
        assert!(config.warehouse.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn postgres_store_is_tagged_by_type() {
        let config: FieldsyncConfig = serde_json::from_str(
            r#"{
                "pipeline": { "name": "onemap" },
                "destination": {
                    "type": "postgres",
                    "connection": {
                        "host": "localhost",
                        "port": 5432,
                        "name": "fieldsync",
                        "username": "postgres"
                    }
                }
            }"#,
        )
        .unwrap();

        assert!(matches!(config.destination, StoreConfig::Postgres { .. }));
    }
}
