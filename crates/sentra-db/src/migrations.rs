//! Embedded database migrations.
//!
//! Migrations live in the crate's `migrations/` directory and are
//! compiled into the binary, so a deployed process can bring its own
//! schema up to date at startup.

use crate::error::DbError;
use crate::pool::DbPool;

/// Run all pending migrations against the given pool.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool.inner())
        .await
        .map_err(DbError::MigrationFailed)?;

    tracing::info!("Database migrations completed");
    Ok(())
}
