//! Typed payment provider events.
//!
//! Provider payloads arrive as a JSON envelope with a top-level `id`
//! and `type`. The envelope is all ingress needs; the worker later
//! classifies the full payload into a [`PaymentEvent`] variant. Event
//! types outside the known set land in `Unknown`, which the worker
//! treats as a successful no-op so unrecognized provider traffic never
//! turns into retry storms.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

/// Envelope fields every provider event must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub event_id: String,
    pub event_type: String,
}

impl EventEnvelope {
    /// Extract the envelope from a raw payload.
    ///
    /// `id` is mandatory; a missing `type` is tolerated and classifies
    /// as `Unknown` downstream.
    pub fn from_payload(payload: &JsonValue) -> Result<Self, EventParseError> {
        let event_id = payload
            .get("id")
            .and_then(JsonValue::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(EventParseError::MissingField("id"))?;
        let event_type = payload
            .get("type")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();

        Ok(Self {
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
        })
    }
}

/// Payload classification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventParseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field: {0}")]
    InvalidField(&'static str),
}

/// A classified payment provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    InvoicePaid {
        external_invoice_id: String,
        amount_paid_cents: i64,
    },
    InvoicePaymentFailed {
        external_invoice_id: String,
    },
    SubscriptionUpdated {
        external_subscription_id: String,
        status: String,
        current_period_end: Option<DateTime<Utc>>,
    },
    SubscriptionDeleted {
        external_subscription_id: String,
    },
    Unknown {
        event_type: String,
    },
}

impl PaymentEvent {
    /// Classify a stored event by its type string and payload.
    ///
    /// Known types with malformed payloads are errors (the worker
    /// retries them); unknown types are not.
    pub fn classify(event_type: &str, payload: &JsonValue) -> Result<Self, EventParseError> {
        match event_type {
            "invoice.paid" => Ok(PaymentEvent::InvoicePaid {
                external_invoice_id: object_id(payload)?,
                amount_paid_cents: object_field(payload, "amount_paid")
                    .and_then(JsonValue::as_i64)
                    .ok_or(EventParseError::InvalidField("amount_paid"))?,
            }),
            "invoice.payment_failed" => Ok(PaymentEvent::InvoicePaymentFailed {
                external_invoice_id: object_id(payload)?,
            }),
            "customer.subscription.updated" => Ok(PaymentEvent::SubscriptionUpdated {
                external_subscription_id: object_id(payload)?,
                status: object_field(payload, "status")
                    .and_then(JsonValue::as_str)
                    .ok_or(EventParseError::MissingField("status"))?
                    .to_string(),
                current_period_end: object_field(payload, "current_period_end")
                    .and_then(JsonValue::as_i64)
                    .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            }),
            "customer.subscription.deleted" => Ok(PaymentEvent::SubscriptionDeleted {
                external_subscription_id: object_id(payload)?,
            }),
            other => Ok(PaymentEvent::Unknown {
                event_type: other.to_string(),
            }),
        }
    }
}

/// `data.object.<field>` lookup.
fn object_field<'a>(payload: &'a JsonValue, field: &str) -> Option<&'a JsonValue> {
    payload.get("data")?.get("object")?.get(field)
}

/// `data.object.id`, required on every known event type.
fn object_id(payload: &JsonValue) -> Result<String, EventParseError> {
    object_field(payload, "id")
        .and_then(JsonValue::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(EventParseError::MissingField("data.object.id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_requires_id() {
        let err = EventEnvelope::from_payload(&json!({"type": "invoice.paid"})).unwrap_err();
        assert_eq!(err, EventParseError::MissingField("id"));

        let err = EventEnvelope::from_payload(&json!({"id": "", "type": "x"})).unwrap_err();
        assert_eq!(err, EventParseError::MissingField("id"));
    }

    #[test]
    fn test_envelope_tolerates_missing_type() {
        let envelope = EventEnvelope::from_payload(&json!({"id": "evt_1"})).unwrap();
        assert_eq!(envelope.event_id, "evt_1");
        assert_eq!(envelope.event_type, "");
    }

    #[test]
    fn test_classify_invoice_paid() {
        let payload = json!({
            "id": "evt_1",
            "type": "invoice.paid",
            "data": {"object": {"id": "in_123", "amount_paid": 10900}}
        });
        let event = PaymentEvent::classify("invoice.paid", &payload).unwrap();
        assert_eq!(
            event,
            PaymentEvent::InvoicePaid {
                external_invoice_id: "in_123".to_string(),
                amount_paid_cents: 10900,
            }
        );
    }

    #[test]
    fn test_classify_invoice_paid_requires_amount() {
        let payload = json!({"data": {"object": {"id": "in_123"}}});
        let err = PaymentEvent::classify("invoice.paid", &payload).unwrap_err();
        assert_eq!(err, EventParseError::InvalidField("amount_paid"));
    }

    #[test]
    fn test_classify_payment_failed() {
        let payload = json!({"data": {"object": {"id": "in_123"}}});
        let event = PaymentEvent::classify("invoice.payment_failed", &payload).unwrap();
        assert_eq!(
            event,
            PaymentEvent::InvoicePaymentFailed {
                external_invoice_id: "in_123".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_subscription_updated() {
        let payload = json!({
            "data": {"object": {
                "id": "sub_9",
                "status": "past_due",
                "current_period_end": 1_760_000_000
            }}
        });
        let event = PaymentEvent::classify("customer.subscription.updated", &payload).unwrap();
        match event {
            PaymentEvent::SubscriptionUpdated {
                external_subscription_id,
                status,
                current_period_end,
            } => {
                assert_eq!(external_subscription_id, "sub_9");
                assert_eq!(status, "past_due");
                assert_eq!(
                    current_period_end,
                    DateTime::from_timestamp(1_760_000_000, 0)
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_classify_subscription_updated_period_optional() {
        let payload = json!({"data": {"object": {"id": "sub_9", "status": "active"}}});
        let event = PaymentEvent::classify("customer.subscription.updated", &payload).unwrap();
        assert!(matches!(
            event,
            PaymentEvent::SubscriptionUpdated { current_period_end: None, .. }
        ));
    }

    #[test]
    fn test_classify_subscription_deleted() {
        let payload = json!({"data": {"object": {"id": "sub_9"}}});
        let event = PaymentEvent::classify("customer.subscription.deleted", &payload).unwrap();
        assert_eq!(
            event,
            PaymentEvent::SubscriptionDeleted {
                external_subscription_id: "sub_9".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_unknown_type_is_not_an_error() {
        let event = PaymentEvent::classify("charge.refunded", &json!({})).unwrap();
        assert_eq!(
            event,
            PaymentEvent::Unknown {
                event_type: "charge.refunded".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_known_type_missing_object_id() {
        let err = PaymentEvent::classify("invoice.paid", &json!({"data": {}})).unwrap_err();
        assert_eq!(err, EventParseError::MissingField("data.object.id"));
    }
}
