use fieldsync_config::load_config;
use fieldsync_config::shared::FieldsyncConfig;

use crate::error::{ReplicatorError, ReplicatorResult};

/// Loads and validates the fieldsync configuration from `configuration/`.
pub fn load_fieldsync_config() -> ReplicatorResult<FieldsyncConfig> {
    let config = load_config::<FieldsyncConfig>().map_err(ReplicatorError::config)?;
    config.validate().map_err(ReplicatorError::config)?;

    Ok(config)
}
