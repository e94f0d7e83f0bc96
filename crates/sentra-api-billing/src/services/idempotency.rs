//! Idempotency guard over billing mutations.
//!
//! The guard wraps [`IdempotencyRecord`]'s single-statement claim.
//! `begin` decides between running the effect, replaying the recorded
//! response, and refusing; `complete`/`fail` record the outcome and must
//! run on the same transaction as the effect so both commit or neither
//! does.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use sentra_core::constants::IDEMPOTENCY_KEY_MAX_LEN;
use sentra_db::models::{IdempotencyRecord, NewIdempotencyRecord};
use sentra_db::DbError;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use sqlx::{PgExecutor, PgPool};
use tracing::instrument;

/// What a claim attempt decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// This caller owns the key; run the effect, then complete or fail.
    Proceed,
    /// A completed, unexpired record holds the original response.
    Replay {
        status: StatusCode,
        body: JsonValue,
    },
    /// The key is held by an in-flight request, or burned by a failed
    /// one; it stays dead until expiry.
    Conflict,
}

/// Validate a client-supplied key before touching the database.
pub fn validate_key(key: &str) -> Result<(), &'static str> {
    if key.trim().is_empty() {
        return Err("key must not be empty");
    }
    if key.len() > IDEMPOTENCY_KEY_MAX_LEN {
        return Err("key exceeds 255 characters");
    }
    Ok(())
}

/// SHA-256 hex digest of the raw request body.
#[must_use]
pub fn request_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Claim-or-replay gate in front of every guarded mutation.
#[derive(Clone)]
pub struct IdempotencyGuard {
    pool: PgPool,
}

impl IdempotencyGuard {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Try to claim `key` for this request.
    ///
    /// The insert-or-reset statement decides every race; a caller that
    /// does not get the row back inspects the live record and either
    /// replays or conflicts. A record that disappears between the two
    /// statements (sweeped mid-flight) counts as a conflict; the client
    /// retries with the same key once the window is clean.
    #[instrument(skip(self, body), fields(key = %key))]
    pub async fn begin(
        &self,
        key: &str,
        method: &str,
        path: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<GuardOutcome, sqlx::Error> {
        let input = NewIdempotencyRecord {
            key: key.to_string(),
            request_path: path.to_string(),
            request_method: method.to_string(),
            request_hash: request_hash(body),
        };

        if IdempotencyRecord::try_begin(&self.pool, &input, now)
            .await?
            .is_some()
        {
            return Ok(GuardOutcome::Proceed);
        }

        match IdempotencyRecord::find_by_key(&self.pool, key).await? {
            Some(record) if record.can_replay_at(now) => Ok(replay_outcome(&record)),
            _ => Ok(GuardOutcome::Conflict),
        }
    }

    /// Record the response and mark the key completed, on the effect's
    /// transaction.
    pub async fn complete<'e, E>(
        executor: E,
        key: &str,
        status: StatusCode,
        body: &JsonValue,
    ) -> Result<(), DbError>
    where
        E: PgExecutor<'e>,
    {
        IdempotencyRecord::complete(executor, key, status.as_u16() as i16, body).await
    }

    /// Burn the key after the effect errored.
    pub async fn fail<'e, E>(executor: E, key: &str) -> Result<(), DbError>
    where
        E: PgExecutor<'e>,
    {
        IdempotencyRecord::fail(executor, key).await
    }
}

/// Package a completed record as a replay.
fn replay_outcome(record: &IdempotencyRecord) -> GuardOutcome {
    let status = record
        .response_status_code
        .and_then(|code| u16::try_from(code).ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);
    GuardOutcome::Replay {
        status,
        body: record.response_body.clone().unwrap_or(JsonValue::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn completed_record(code: Option<i16>, body: Option<JsonValue>) -> IdempotencyRecord {
        IdempotencyRecord {
            id: Uuid::new_v4(),
            key: "k".to_string(),
            request_path: "/billing/invoices".to_string(),
            request_method: "POST".to_string(),
            request_hash: "0".repeat(64),
            status: "completed".to_string(),
            response_status_code: code,
            response_body: body,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_validate_key_rejects_empty_and_oversized() {
        assert!(validate_key("").is_err());
        assert!(validate_key("   ").is_err());
        assert!(validate_key(&"k".repeat(256)).is_err());
        assert!(validate_key(&"k".repeat(255)).is_ok());
        assert!(validate_key("order-2026-08-0001").is_ok());
    }

    #[test]
    fn test_request_hash_is_sha256_hex() {
        // sha256("") is the canonical empty digest.
        assert_eq!(
            request_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(request_hash(b"{}").len(), 64);
        assert_ne!(request_hash(b"a"), request_hash(b"b"));
    }

    #[test]
    fn test_replay_preserves_original_status() {
        let record = completed_record(Some(404), Some(serde_json::json!({"error": "x"})));
        match replay_outcome(&record) {
            GuardOutcome::Replay { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body["error"], serde_json::json!("x"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_replay_tolerates_missing_response_fields() {
        let record = completed_record(None, None);
        match replay_outcome(&record) {
            GuardOutcome::Replay { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body, JsonValue::Null);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
