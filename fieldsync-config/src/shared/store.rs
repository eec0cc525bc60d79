use std::path::PathBuf;

use serde::Deserialize;

use crate::shared::{PgConnectionConfig, ValidationError};

/// Backing store for one of the staging, destination or warehouse roles.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StoreConfig {
    /// In-process store. Staging may be seeded from a JSON file of records.
    Memory {
        #[serde(default)]
        seed_path: Option<PathBuf>,
    },
    /// Postgres backed store.
    Postgres { connection: PgConnectionConfig },
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            StoreConfig::Memory { .. } => Ok(()),
            StoreConfig::Postgres { connection } => connection.validate(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory { seed_path: None }
    }
}
