use serde::Deserialize;

use crate::shared::ValidationError;

/// Identity of a sync pipeline and the collections it writes to.
#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    /// Name used for checkpoints, reports and log fields.
    pub name: String,
    /// Tag written to every entity this pipeline creates.
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
    #[serde(default = "default_entity_collection")]
    pub entity_collection: String,
    #[serde(default = "default_history_collection")]
    pub history_collection: String,
    /// Recorded in each entity's sync metadata.
    #[serde(default = "default_sync_type")]
    pub sync_type: String,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::invalid("pipeline.name", "must not be empty"));
        }
        if self.source_tag.trim().is_empty() {
            return Err(ValidationError::invalid(
                "pipeline.source_tag",
                "must not be empty",
            ));
        }

        Ok(())
    }

    /// Collection tag used for history entries in mirror events.
    pub fn history_path(&self) -> String {
        format!("{}/{}", self.entity_collection, self.history_collection)
    }
}

fn default_source_tag() -> String {
    "vf-onemap-data".to_string()
}

fn default_entity_collection() -> String {
    "planned-poles".to_string()
}

fn default_history_collection() -> String {
    "statusHistory".to_string()
}

fn default_sync_type() -> String {
    "full-status-history".to_string()
}
