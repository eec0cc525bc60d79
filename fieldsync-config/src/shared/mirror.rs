use serde::Deserialize;

use crate::shared::ValidationError;

/// Retry behaviour of the warehouse mirror.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Attempts after which a failed event is dead-lettered.
    pub max_attempts: u32,
    /// Failures older than this many hours are no longer retried.
    pub retention_hours: u32,
    /// Maximum failures picked up by a single retry sweep.
    pub retry_batch_limit: u32,
    /// Interval between retry sweeps in watch mode.
    pub retry_interval_secs: u64,
}

impl MirrorConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_RETENTION_HOURS: u32 = 24;
    pub const DEFAULT_RETRY_BATCH_LIMIT: u32 = 100;
    pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15 * 60;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::invalid(
                "mirror.max_attempts",
                "must be at least 1",
            ));
        }
        if self.retry_batch_limit == 0 {
            return Err(ValidationError::invalid(
                "mirror.retry_batch_limit",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            retention_hours: Self::DEFAULT_RETENTION_HOURS,
            retry_batch_limit: Self::DEFAULT_RETRY_BATCH_LIMIT,
            retry_interval_secs: Self::DEFAULT_RETRY_INTERVAL_SECS,
        }
    }
}
