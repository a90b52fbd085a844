use std::time::Duration;

use memento_core::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::RepoError;

/// Builds the connection pool the way the rest of this engine's storage layer expects: bounded
/// pool size, explicit connect/idle timeouts read from config rather than library defaults.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, RepoError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.pool_max)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .idle_timeout(Duration::from_millis(config.idle_timeout_ms))
        .connect(&config.url)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), RepoError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
