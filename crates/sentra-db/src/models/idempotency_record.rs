//! Idempotency record model.
//!
//! One row per idempotency key. The row is the lock: the UNIQUE
//! constraint on `key` plus the single insert-or-reset statement in
//! [`IdempotencyRecord::try_begin`] decide every race, so two requests
//! carrying the same key can never both reach the guarded side effect.

use chrono::{DateTime, Duration, Utc};
use sentra_core::constants::IDEMPOTENCY_EXPIRY_HOURS;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::error::DbError;

/// Lifecycle of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyStatus {
    /// A request holding this key is in flight.
    Processing,
    /// The guarded effect committed; the cached response is replayable.
    Completed,
    /// The guarded effect errored; the key is dead until expiry.
    Failed,
}

impl std::fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdempotencyStatus::Processing => write!(f, "processing"),
            IdempotencyStatus::Completed => write!(f, "completed"),
            IdempotencyStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for IdempotencyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(IdempotencyStatus::Processing),
            "completed" => Ok(IdempotencyStatus::Completed),
            "failed" => Ok(IdempotencyStatus::Failed),
            _ => Err(format!("Invalid idempotency status: {s}")),
        }
    }
}

/// An idempotency record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct IdempotencyRecord {
    /// Unique identifier.
    pub id: Uuid,
    /// Client-supplied idempotency key.
    pub key: String,
    /// Path the key was first used against.
    pub request_path: String,
    /// Method the key was first used with.
    pub request_method: String,
    /// SHA-256 hex of the first request's body (collision diagnostics).
    pub request_hash: String,
    /// Lifecycle status.
    pub status: String,
    /// Cached response status (present once completed).
    pub response_status_code: Option<i16>,
    /// Cached response body (present once completed).
    pub response_body: Option<JsonValue>,
    /// When this record was created (or reset after expiry).
    pub created_at: DateTime<Utc>,
    /// When this record stops being live.
    pub expires_at: DateTime<Utc>,
}

/// Input for claiming a key.
#[derive(Debug, Clone)]
pub struct NewIdempotencyRecord {
    pub key: String,
    pub request_path: String,
    pub request_method: String,
    pub request_hash: String,
}

impl IdempotencyRecord {
    /// Get the status as enum.
    #[must_use]
    pub fn status_enum(&self) -> Option<IdempotencyStatus> {
        self.status.parse().ok()
    }

    /// Whether the record has expired as of `at`.
    #[must_use]
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.expires_at <= at
    }

    /// Whether the cached response may be replayed as of `at`.
    ///
    /// Only completed, unexpired records replay. `processing` and
    /// `failed` records conflict instead.
    #[must_use]
    pub fn can_replay_at(&self, at: DateTime<Utc>) -> bool {
        self.status_enum() == Some(IdempotencyStatus::Completed) && !self.is_expired_at(at)
    }

    /// Try to claim a key, atomically.
    ///
    /// One statement covers all three first-contact cases:
    /// - key never seen: plain insert, row returned;
    /// - key seen but expired: row reset to `processing` with a fresh
    ///   window, row returned (expiry reuse is a brand-new request);
    /// - key live: conflict target hit but the `WHERE` rejects the
    ///   update, nothing returned.
    ///
    /// A concurrent claimant blocks on the key's index entry until the
    /// winner commits, then re-evaluates the expiry predicate, so at
    /// most one caller ever gets a row back per live window.
    pub async fn try_begin<'e, E>(
        executor: E,
        input: &NewIdempotencyRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let expires_at = now + Duration::hours(IDEMPOTENCY_EXPIRY_HOURS);
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO idempotency_records
                (key, request_path, request_method, request_hash, status, expires_at)
            VALUES ($1, $2, $3, $4, 'processing', $5)
            ON CONFLICT (key) DO UPDATE SET
                request_path = EXCLUDED.request_path,
                request_method = EXCLUDED.request_method,
                request_hash = EXCLUDED.request_hash,
                status = 'processing',
                response_status_code = NULL,
                response_body = NULL,
                created_at = $6,
                expires_at = EXCLUDED.expires_at
            WHERE idempotency_records.expires_at <= $6
            RETURNING id, key, request_path, request_method, request_hash, status,
                      response_status_code, response_body, created_at, expires_at
            ",
        )
        .bind(&input.key)
        .bind(&input.request_path)
        .bind(&input.request_method)
        .bind(&input.request_hash)
        .bind(expires_at)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// Fetch a record by key.
    pub async fn find_by_key<'e, E>(executor: E, key: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, key, request_path, request_method, request_hash, status,
                   response_status_code, response_body, created_at, expires_at
            FROM idempotency_records
            WHERE key = $1
            ",
        )
        .bind(key)
        .fetch_optional(executor)
        .await
    }

    /// Record the guarded effect's response and mark the key completed.
    ///
    /// Must run on the same transaction as the effect itself; the guard
    /// only holds if both commit or neither does.
    pub async fn complete<'e, E>(
        executor: E,
        key: &str,
        status_code: i16,
        body: &JsonValue,
    ) -> Result<(), DbError>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE idempotency_records
            SET status = 'completed', response_status_code = $2, response_body = $3
            WHERE key = $1 AND status = 'processing'
            ",
        )
        .bind(key)
        .bind(status_code)
        .bind(body)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleTransition(format!(
                "idempotency key {key} is not processing"
            )));
        }
        Ok(())
    }

    /// Mark the key failed after the guarded effect errored.
    ///
    /// The key stays dead until expiry; clients retry with a new key.
    pub async fn fail<'e, E>(executor: E, key: &str) -> Result<(), DbError>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE idempotency_records
            SET status = 'failed'
            WHERE key = $1 AND status = 'processing'
            ",
        )
        .bind(key)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleTransition(format!(
                "idempotency key {key} is not processing"
            )));
        }
        Ok(())
    }

    /// Delete expired records. Returns how many were removed.
    pub async fn delete_expired<'e, E>(executor: E, now: DateTime<Utc>) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM idempotency_records WHERE expires_at <= $1")
            .bind(now)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(status: &str, expires_at: DateTime<Utc>) -> IdempotencyRecord {
        IdempotencyRecord {
            id: Uuid::new_v4(),
            key: "test-key".to_string(),
            request_path: "/billing/invoices".to_string(),
            request_method: "POST".to_string(),
            request_hash: "0".repeat(64),
            status: status.to_string(),
            response_status_code: None,
            response_body: None,
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn test_status_display_round_trip() {
        for status in [
            IdempotencyStatus::Processing,
            IdempotencyStatus::Completed,
            IdempotencyStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<IdempotencyStatus>(), Ok(status));
        }
        assert!("pending".parse::<IdempotencyStatus>().is_err());
    }

    #[test]
    fn test_completed_unexpired_can_replay() {
        let record = record_with("completed", Utc::now() + Duration::hours(1));
        assert!(record.can_replay_at(Utc::now()));
    }

    #[test]
    fn test_completed_expired_cannot_replay() {
        let now = Utc::now();
        let record = record_with("completed", now - Duration::seconds(1));
        assert!(record.is_expired_at(now));
        assert!(!record.can_replay_at(now));
    }

    #[test]
    fn test_processing_cannot_replay() {
        let record = record_with("processing", Utc::now() + Duration::hours(1));
        assert!(!record.can_replay_at(Utc::now()));
    }

    #[test]
    fn test_failed_cannot_replay() {
        let record = record_with("failed", Utc::now() + Duration::hours(1));
        assert!(!record.can_replay_at(Utc::now()));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let record = record_with("completed", now);
        assert!(record.is_expired_at(now));
    }
}
