//! Storage infrastructure - Postgres pool and schema migrations

pub mod migrations;
mod postgres;

pub use migrations::{quota_migrations, run_quota_migrations, Migration, Migrator, PostgresMigrator};
pub use postgres::PostgresConfig;
