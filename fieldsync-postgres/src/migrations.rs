use fieldsync_config::shared::{PgConnectionConfig, SessionProfile};
use sqlx::{Executor, postgres::PgPoolOptions};
use tracing::info;

/// Runs the fieldsync and warehouse migrations against a store database.
///
/// The `_sqlx_migrations` bookkeeping table is created inside the `fieldsync` schema
/// so the public schema stays untouched.
pub async fn apply_migrations(connection_config: &PgConnectionConfig) -> Result<(), sqlx::Error> {
    let options = connection_config.connect_options(SessionProfile::Migration);

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("create schema if not exists fieldsync;").await?;
                conn.execute("set search_path = 'fieldsync';").await?;

                Ok(())
            })
        })
        .connect_with(options)
        .await?;

    info!(
        host = %connection_config.host,
        database = %connection_config.name,
        "applying fieldsync migrations"
    );

    let migrator = sqlx::migrate!("./migrations");
    migrator.run(&pool).await?;

    info!("fieldsync migrations successfully applied");

    Ok(())
}
