//! Connection pool construction.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::error::DbError;

/// Default maximum connections held by the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default time to wait for a connection before giving up.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Server-side statement timeout. Postgres reads a bare integer as
/// milliseconds.
const DEFAULT_STATEMENT_TIMEOUT_MS: &str = "30000";

/// Wrapper around [`sqlx::PgPool`] with sentra's defaults applied.
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    /// Connect to PostgreSQL with the platform defaults.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        Self::connect_with_max(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with an explicit connection cap (worker processes run
    /// with a smaller pool than the API).
    pub async fn connect_with_max(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, DbError> {
        let options = PgConnectOptions::from_str(database_url)
            .map_err(DbError::ConnectionFailed)?
            .options([("statement_timeout", DEFAULT_STATEMENT_TIMEOUT_MS)]);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(DbError::ConnectionFailed)?;
        Ok(Self { pool })
    }

    /// Wrap an already-constructed pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool for query execution.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}
