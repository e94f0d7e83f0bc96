//! Request and response DTOs for webhook endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Acknowledgment body returned to the webhook sender.
///
/// Ingress always answers 200 once the delivery is authenticated (and
/// even without authentication for unconfigured services); the `status`
/// field tells an operator reading provider logs what actually happened.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngressAck {
    /// One of `accepted`, `duplicate`, `configuration_error`.
    #[schema(example = "accepted")]
    pub status: String,

    /// Provider event id, present on `accepted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl IngressAck {
    #[must_use]
    pub fn accepted(event_id: String) -> Self {
        Self {
            status: "accepted".to_string(),
            event_id: Some(event_id),
        }
    }

    #[must_use]
    pub fn duplicate() -> Self {
        Self {
            status: "duplicate".to_string(),
            event_id: None,
        }
    }

    #[must_use]
    pub fn configuration_error() -> Self {
        Self {
            status: "configuration_error".to_string(),
            event_id: None,
        }
    }
}

/// Query parameters for the admin event listing.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListEventsQuery {
    /// Filter by source service.
    pub service: Option<String>,

    /// Filter by provider event type.
    pub event_type: Option<String>,

    /// Filter by processed flag.
    pub processed: Option<bool>,

    /// Return events created strictly before this instant.
    pub cursor: Option<DateTime<Utc>>,

    /// Page size (1-100).
    #[serde(default = "default_limit")]
    pub limit: i32,
}

fn default_limit() -> i32 {
    50
}

/// A stored webhook event as exposed to administrators.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookEventResponse {
    pub id: Uuid,
    pub service: String,
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub processing_error: Option<String>,
    pub retry_count: i32,
    /// Whether the retry budget is spent and the event awaits a manual
    /// retry.
    pub given_up: bool,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Cursor-paginated event listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookEventListResponse {
    pub items: Vec<WebhookEventResponse>,
    /// Pass back as `cursor` to fetch the next page; absent on the last
    /// page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_omits_absent_event_id() {
        let json = serde_json::to_value(IngressAck::duplicate()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "duplicate"}));
    }

    #[test]
    fn test_ack_includes_event_id_when_accepted() {
        let json = serde_json::to_value(IngressAck::accepted("evt_1".to_string())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "accepted", "event_id": "evt_1"})
        );
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListEventsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 50);
        assert!(query.service.is_none());
        assert!(query.processed.is_none());
    }
}
