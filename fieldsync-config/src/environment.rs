use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Variable naming the deployment environment.
pub const ENVIRONMENT_VAR: &str = "FIELDSYNC_ENVIRONMENT";

/// Deployment environment. Selects the overlay file on top of `base`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    /// In-memory stores seeded from disk.
    #[default]
    Dev,
    /// Postgres-backed stores.
    Prod,
}

#[derive(Debug, Error)]
#[error("unknown environment `{0}`, expected `dev` or `prod`")]
pub struct UnknownEnvironment(String);

impl Environment {
    /// Reads [`ENVIRONMENT_VAR`]. An unset variable means [`Environment::Dev`].
    pub fn from_env() -> Result<Environment, UnknownEnvironment> {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Environment::default()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(UnknownEnvironment(s.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
