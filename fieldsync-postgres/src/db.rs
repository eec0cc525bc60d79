use fieldsync_config::shared::{PgConnectionConfig, SessionProfile};
use sqlx::{PgPool, postgres::PgPoolOptions};

/// Default number of pooled connections for a store.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Connects to a store database with the fieldsync session options applied.
pub async fn connect_to_store(
    config: &PgConnectionConfig,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(max_connections)
        .connect_with(config.connect_options(SessionProfile::Store))
        .await
}
