//! Migrate command - applies the quota schema to PostgreSQL

use anyhow::Context;
use tracing::info;

use crate::infrastructure::storage::{Migrator, PostgresConfig, PostgresMigrator};

pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let url = config
        .storage
        .resolved_database_url()
        .context("storage.database_url or DATABASE_URL must be set to run migrations")?;

    let pool = PostgresConfig::new(url)
        .with_max_connections(1)
        .with_min_connections(1)
        .connect()
        .await?;

    let migrator = PostgresMigrator::new(pool);
    migrator.run().await?;

    info!(version = ?migrator.version().await?, "Database schema is up to date");

    Ok(())
}
