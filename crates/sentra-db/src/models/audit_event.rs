//! Audit event model.
//!
//! Append-only. Callers record audit rows on the same transaction as the
//! state change they describe; a change without its audit row (or the
//! reverse) cannot be committed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// An audit trail entry.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditEvent {
    /// Unique identifier.
    pub id: Uuid,
    /// Dotted event name, e.g. `invoice.paid`.
    pub event_type: String,
    /// Acting user, when the change was operator-initiated.
    pub user_id: Option<Uuid>,
    /// Organization the change belongs to.
    pub organization_id: Option<Uuid>,
    /// Structured event detail.
    pub data: JsonValue,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// Input for recording an audit event.
#[derive(Debug, Clone)]
pub struct RecordAuditEvent {
    pub event_type: String,
    pub user_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub data: JsonValue,
}

impl AuditEvent {
    /// Append an event.
    pub async fn record<'e, E>(executor: E, input: &RecordAuditEvent) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO audit_events (event_type, user_id, organization_id, data)
            VALUES ($1, $2, $3, $4)
            RETURNING id, event_type, user_id, organization_id, data, created_at
            ",
        )
        .bind(&input.event_type)
        .bind(input.user_id)
        .bind(input.organization_id)
        .bind(&input.data)
        .fetch_one(executor)
        .await
    }

    /// Recent events of one type, newest first.
    pub async fn list_by_type<'e, E>(
        executor: E,
        event_type: &str,
        limit: i32,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, event_type, user_id, organization_id, data, created_at
            FROM audit_events
            WHERE event_type = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(event_type)
        .bind(limit)
        .fetch_all(executor)
        .await
    }
}
