use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::Config;
use crate::shared::ValidationError;

/// Session settings applied to every fieldsync connection, whatever its purpose.
const SESSION_DEFAULTS: [(&str, &str); 5] = [
    ("datestyle", "ISO"),
    ("intervalstyle", "postgres"),
    ("extra_float_digits", "3"),
    ("client_encoding", "UTF8"),
    ("timezone", "UTC"),
];

/// Purpose of a connection. Each purpose gets its own timeouts and application name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionProfile {
    /// Store reads and batch commits.
    Store,
    /// Schema migrations, which may hold locks for longer.
    Migration,
}

impl SessionProfile {
    pub fn application_name(&self) -> &'static str {
        match self {
            SessionProfile::Store => "fieldsync_store",
            SessionProfile::Migration => "fieldsync_migrations",
        }
    }

    /// Statement timeout in milliseconds.
    pub fn statement_timeout_ms(&self) -> u32 {
        match self {
            SessionProfile::Store => 60_000,
            SessionProfile::Migration => 300_000,
        }
    }

    /// Runtime parameters sent in the startup packet.
    pub fn settings(&self) -> Vec<(String, String)> {
        let mut settings: Vec<(String, String)> = SESSION_DEFAULTS
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        settings.extend([
            (
                "statement_timeout".to_string(),
                self.statement_timeout_ms().to_string(),
            ),
            ("lock_timeout".to_string(), "10000".to_string()),
            (
                "idle_in_transaction_session_timeout".to_string(),
                "60000".to_string(),
            ),
            (
                "application_name".to_string(),
                self.application_name().to_string(),
            ),
        ]);

        settings
    }
}

/// Connection to one Postgres-backed store.
#[derive(Debug, Clone, Deserialize)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Database name.
    pub name: String,
    pub username: String,
    /// Redacted in debug output.
    pub password: Option<SecretString>,
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
}

impl PgConnectionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::invalid(
                "connection.name",
                "must not be empty",
            ));
        }

        self.tls.validate()
    }

    /// Driver options for this database with the session settings of `profile`.
    pub fn connect_options(&self, profile: SessionProfile) -> PgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            PgSslMode::VerifyFull
        } else {
            PgSslMode::Prefer
        };

        let options = PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .database(&self.name)
            .ssl_mode(ssl_mode)
            .ssl_root_cert_from_pem(self.tls.trusted_root_certs.clone().into_bytes())
            .options(profile.settings());

        match &self.password {
            Some(password) => options.password(password.expose_secret()),
            None => options,
        }
    }
}

impl Config for PgConnectionConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM-encoded trusted root certificates.
    pub trusted_root_certs: String,
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: String::new(),
            enabled: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}
