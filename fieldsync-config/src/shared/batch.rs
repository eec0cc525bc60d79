use serde::Deserialize;

use crate::shared::ValidationError;

/// Write batching configuration for destination commits.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Maximum number of write operations the destination accepts in one atomic batch.
    #[serde(default = "default_max_operations")]
    pub max_operations: usize,
    /// Number of immediate retries for a rejected batch before the page is aborted.
    #[serde(default = "default_commit_retries")]
    pub commit_retries: u32,
}

impl BatchConfig {
    /// Default maximum number of operations per batch.
    pub const DEFAULT_MAX_OPERATIONS: usize = 500;

    /// Default number of immediate commit retries.
    pub const DEFAULT_COMMIT_RETRIES: u32 = 1;

    /// Validates batch configuration settings.
    ///
    /// Ensures max_operations can hold at least an entity and one history entry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_operations < 2 {
            return Err(ValidationError::invalid(
                "batch.max_operations",
                "must be at least 2",
            ));
        }

        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            commit_retries: default_commit_retries(),
        }
    }
}

fn default_max_operations() -> usize {
    BatchConfig::DEFAULT_MAX_OPERATIONS
}

fn default_commit_retries() -> u32 {
    BatchConfig::DEFAULT_COMMIT_RETRIES
}
