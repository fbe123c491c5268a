//! Persistence for the Vigil session service.
//!
//! - [`models`] -- row structs and create DTOs.
//! - [`repositories`] -- PostgreSQL queries, one unit struct per table.
//! - [`store`] -- the capability traits the service depends on
//!   ([`TokenStore`], [`UserDirectory`], [`ConnectionMirror`]).
//! - [`pg`] -- trait implementations backed by a [`DbPool`].
//! - [`memory`] -- in-process implementations for single-node development
//!   and tests.

use sqlx::postgres::PgPoolOptions;

pub mod memory;
pub mod models;
pub mod pg;
pub mod repositories;
pub mod store;

pub use store::{ConnectionMirror, StoreError, StoreResult, TokenStore, UserDirectory};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
