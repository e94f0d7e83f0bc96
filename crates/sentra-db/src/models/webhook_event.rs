//! Webhook event model.
//!
//! Stores every accepted provider event exactly once. The UNIQUE
//! (service, event_id) pair is the deduplication boundary; everything
//! downstream assumes a given provider event occupies at most one row.
//!
//! Claiming works on a lease: [`WebhookEvent::claim_due_batch`] pushes
//! `next_retry_at` into the near future in the same statement that
//! selects the rows, so a claimed event is invisible to other pollers
//! while its task runs and resurfaces on its own if the process dies
//! mid-attempt.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::error::DbError;

/// An inbound webhook event in the database.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEvent {
    /// Unique identifier.
    pub id: Uuid,
    /// Source service (e.g. "payments").
    pub service: String,
    /// Provider-assigned event id, unique per service.
    pub event_id: String,
    /// Provider event type string.
    pub event_type: String,
    /// Raw event payload.
    pub payload: JsonValue,
    /// Whether a handler has terminally succeeded on this event.
    pub processed: bool,
    /// When processing succeeded.
    pub processed_at: Option<DateTime<Utc>>,
    /// Last handler error, if any attempt failed.
    pub processing_error: Option<String>,
    /// Number of failed attempts so far.
    pub retry_count: i32,
    /// When the last failed attempt happened.
    pub last_retry_at: Option<DateTime<Utc>>,
    /// When the event is next due (NULL means due now, or given up
    /// when the retry budget is spent).
    pub next_retry_at: Option<DateTime<Utc>>,
    /// When the event was first accepted.
    pub created_at: DateTime<Utc>,
}

/// Input for admitting a new event.
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub service: String,
    pub event_id: String,
    pub event_type: String,
    pub payload: JsonValue,
}

/// Filter options for the admin event listing.
#[derive(Debug, Clone, Default)]
pub struct WebhookEventFilter {
    pub service: Option<String>,
    pub event_type: Option<String>,
    pub processed: Option<bool>,
}

impl WebhookEvent {
    /// Whether the retry budget is spent.
    #[must_use]
    pub fn is_given_up(&self, max_retries: i32) -> bool {
        !self.processed && self.retry_count > max_retries
    }

    /// Admit an event, deduplicating on (service, event_id).
    ///
    /// Returns `None` when the pair was already stored; the existing row
    /// is left untouched, whatever state it is in.
    pub async fn admit<'e, E>(
        executor: E,
        input: &NewWebhookEvent,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO webhook_events (service, event_id, event_type, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (service, event_id) DO NOTHING
            RETURNING id, service, event_id, event_type, payload, processed, processed_at,
                      processing_error, retry_count, last_retry_at, next_retry_at, created_at
            ",
        )
        .bind(&input.service)
        .bind(&input.event_id)
        .bind(&input.event_type)
        .bind(&input.payload)
        .fetch_optional(executor)
        .await
    }

    /// Fetch an event by id.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, service, event_id, event_type, payload, processed, processed_at,
                   processing_error, retry_count, last_retry_at, next_retry_at, created_at
            FROM webhook_events
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Claim a batch of due events for processing.
    ///
    /// Due means unprocessed, retry budget remaining, and either never
    /// attempted or past its scheduled retry. Claimed rows get a lease:
    /// `next_retry_at` moves `lease_secs` into the future so concurrent
    /// pollers (and the next tick of this one) skip them. A crashed
    /// attempt surfaces again when the lease lapses, without consuming
    /// retry budget.
    pub async fn claim_due_batch<'e, E>(
        executor: E,
        now: DateTime<Utc>,
        max_retries: i32,
        lease_secs: i64,
        batch_size: i32,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let lease_until = now + Duration::seconds(lease_secs);
        sqlx::query_as::<_, Self>(
            r"
            UPDATE webhook_events
            SET next_retry_at = $1
            WHERE id IN (
                SELECT id FROM webhook_events
                WHERE processed = FALSE
                  AND retry_count <= $2
                  AND (next_retry_at IS NULL OR next_retry_at <= $3)
                ORDER BY created_at
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, service, event_id, event_type, payload, processed, processed_at,
                      processing_error, retry_count, last_retry_at, next_retry_at, created_at
            ",
        )
        .bind(lease_until)
        .bind(max_retries)
        .bind(now)
        .bind(batch_size)
        .fetch_all(executor)
        .await
    }

    /// Mark an event terminally processed.
    pub async fn mark_processed<'e, E>(
        executor: E,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), DbError>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE webhook_events
            SET processed = TRUE, processed_at = $2, processing_error = NULL
            WHERE id = $1 AND processed = FALSE
            ",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleTransition(format!(
                "webhook event {id} is not pending"
            )));
        }
        Ok(())
    }

    /// Record a failed attempt.
    ///
    /// Increments the failure count and either schedules the next
    /// attempt (`next_retry_at = Some`) or parks the event
    /// (`next_retry_at = None` once the budget is spent).
    pub async fn mark_failed<'e, E>(
        executor: E,
        id: Uuid,
        error: &str,
        now: DateTime<Utc>,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbError>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE webhook_events
            SET retry_count = retry_count + 1,
                processing_error = $2,
                last_retry_at = $3,
                next_retry_at = $4
            WHERE id = $1 AND processed = FALSE
            ",
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .bind(next_retry_at)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleTransition(format!(
                "webhook event {id} is not pending"
            )));
        }
        Ok(())
    }

    /// Reset a parked event so the worker picks it up again.
    ///
    /// Used by the admin retry endpoint after the underlying cause is
    /// fixed. Already-processed events cannot be reset.
    pub async fn reset_for_retry<'e, E>(executor: E, id: Uuid) -> Result<Self, DbError>
    where
        E: PgExecutor<'e>,
    {
        let updated = sqlx::query_as::<_, Self>(
            r"
            UPDATE webhook_events
            SET retry_count = 0, processing_error = NULL, last_retry_at = NULL,
                next_retry_at = now()
            WHERE id = $1 AND processed = FALSE
            RETURNING id, service, event_id, event_type, payload, processed, processed_at,
                      processing_error, retry_count, last_retry_at, next_retry_at, created_at
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        updated.ok_or_else(|| {
            DbError::StaleTransition(format!("webhook event {id} is processed or missing"))
        })
    }

    /// List events with optional filters, newest first.
    pub async fn list<'e, E>(
        executor: E,
        filter: &WebhookEventFilter,
        cursor: Option<DateTime<Utc>>,
        limit: i32,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut conditions: Vec<String> = Vec::new();
        let mut param_idx = 1;

        if filter.service.is_some() {
            conditions.push(format!("service = ${param_idx}"));
            param_idx += 1;
        }

        if filter.event_type.is_some() {
            conditions.push(format!("event_type = ${param_idx}"));
            param_idx += 1;
        }

        if filter.processed.is_some() {
            conditions.push(format!("processed = ${param_idx}"));
            param_idx += 1;
        }

        if cursor.is_some() {
            conditions.push(format!("created_at < ${param_idx}"));
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let query = format!(
            r"
            SELECT id, service, event_id, event_type, payload, processed, processed_at,
                   processing_error, retry_count, last_retry_at, next_retry_at, created_at
            FROM webhook_events
            {where_clause}
            ORDER BY created_at DESC
            LIMIT ${param_idx}
            "
        );

        let mut q = sqlx::query_as::<_, Self>(&query);

        if let Some(service) = &filter.service {
            q = q.bind(service);
        }

        if let Some(event_type) = &filter.event_type {
            q = q.bind(event_type);
        }

        if let Some(processed) = filter.processed {
            q = q.bind(processed);
        }

        if let Some(c) = cursor {
            q = q.bind(c);
        }

        q = q.bind(limit);

        q.fetch_all(executor).await
    }

    /// Delete processed events older than the cutoff. Returns the count.
    pub async fn delete_processed_before<'e, E>(
        executor: E,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "DELETE FROM webhook_events WHERE processed = TRUE AND created_at < $1",
        )
        .bind(cutoff)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_with(processed: bool, retry_count: i32) -> WebhookEvent {
        WebhookEvent {
            id: Uuid::new_v4(),
            service: "payments".to_string(),
            event_id: "evt_001".to_string(),
            event_type: "invoice.paid".to_string(),
            payload: serde_json::json!({}),
            processed,
            processed_at: None,
            processing_error: None,
            retry_count,
            last_retry_at: None,
            next_retry_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_fresh_event_is_not_given_up() {
        assert!(!event_with(false, 0).is_given_up(3));
    }

    #[test]
    fn test_budget_spent_is_given_up() {
        // Three retries permitted: the fourth failure parks the event.
        assert!(!event_with(false, 3).is_given_up(3));
        assert!(event_with(false, 4).is_given_up(3));
    }

    #[test]
    fn test_processed_event_is_never_given_up() {
        assert!(!event_with(true, 4).is_given_up(3));
    }
}
