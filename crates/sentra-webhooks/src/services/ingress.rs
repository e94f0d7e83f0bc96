//! Webhook ingress: authenticate, deduplicate, persist, acknowledge.
//!
//! The ingest path never processes an event inline. It persists the raw
//! payload and answers the sender immediately; the reconciliation worker
//! picks the row up by polling. The one deliberate oddity is the
//! unconfigured-service path, which acknowledges 200 without persisting
//! anything so the provider stops redelivering while an operator fixes
//! the secret configuration.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sentra_core::constants::WEBHOOK_TIMESTAMP_TOLERANCE_SECS;
use sentra_db::models::{NewWebhookEvent, WebhookEvent};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::{error, info};

use crate::crypto;
use crate::error::IngressError;
use crate::event::EventEnvelope;
use crate::models::IngressAck;

/// Service handling inbound webhook deliveries.
#[derive(Clone)]
pub struct IngressService {
    pool: PgPool,
    /// Shared secret per source service.
    secrets: HashMap<String, String>,
    tolerance_secs: i64,
}

impl IngressService {
    /// Create a new ingress service.
    #[must_use]
    pub fn new(pool: PgPool, secrets: HashMap<String, String>) -> Self {
        Self {
            pool,
            secrets,
            tolerance_secs: WEBHOOK_TIMESTAMP_TOLERANCE_SECS,
        }
    }

    /// Override the timestamp tolerance window (for testing).
    #[must_use]
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Handle one raw delivery for `service`.
    pub async fn ingest(
        &self,
        service: &str,
        timestamp_header: Option<&str>,
        signature_header: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<IngressAck, IngressError> {
        let Some(secret) = self.secrets.get(service) else {
            error!(
                service = %service,
                "Webhook received for a service with no configured secret"
            );
            return Ok(IngressAck::configuration_error());
        };

        crypto::authenticate(
            secret,
            timestamp_header,
            signature_header,
            body,
            now.timestamp(),
            self.tolerance_secs,
        )?;

        let payload: JsonValue = serde_json::from_slice(body)
            .map_err(|e| IngressError::InvalidEnvelope(e.to_string()))?;
        let envelope = EventEnvelope::from_payload(&payload)
            .map_err(|e| IngressError::InvalidEnvelope(e.to_string()))?;

        let admitted = WebhookEvent::admit(
            &self.pool,
            &NewWebhookEvent {
                service: service.to_string(),
                event_id: envelope.event_id.clone(),
                event_type: envelope.event_type.clone(),
                payload,
            },
        )
        .await?;

        match admitted {
            Some(event) => {
                info!(
                    service = %service,
                    event_id = %envelope.event_id,
                    event_type = %envelope.event_type,
                    id = %event.id,
                    "Webhook event accepted"
                );
                Ok(IngressAck::accepted(envelope.event_id))
            }
            None => {
                info!(
                    service = %service,
                    event_id = %envelope.event_id,
                    "Duplicate webhook delivery acknowledged without reprocessing"
                );
                Ok(IngressAck::duplicate())
            }
        }
    }
}
