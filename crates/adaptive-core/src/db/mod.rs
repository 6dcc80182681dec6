//! Database access layer for PostgreSQL.

pub mod trades;

use crate::config::DatabaseConfig;
use crate::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use trades::PgTradeHistory;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    Ok(pool)
}

/// Apply the embedded schema for trades, bots and risk states.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrator = sqlx::migrate!("../../migrations");
    migrator.run(pool).await?;
    info!(migrations = migrator.iter().count(), "Database schema up to date");
    Ok(())
}
