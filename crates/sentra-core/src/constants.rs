//! Platform-wide constants.
//!
//! Single source of truth for the numbers that define platform behavior.
//! Anything tunable per deployment lives in the app config instead; the
//! values here are contractual and changing them changes API semantics.

/// Header that carries the client-supplied idempotency key on guarded
/// mutation endpoints.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// How long an idempotency record stays live. A key reused after this
/// window is treated as a brand-new request.
pub const IDEMPOTENCY_EXPIRY_HOURS: i64 = 24;

/// Maximum accepted length of an idempotency key.
pub const IDEMPOTENCY_KEY_MAX_LEN: usize = 255;

/// Header carrying the unix timestamp a webhook payload was signed at.
pub const WEBHOOK_TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

/// Header carrying the webhook signature (hex HMAC or `t=..,v1=..` form).
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Maximum clock skew accepted between a webhook's signed timestamp and
/// our clock, in seconds. Outside this window the signature is rejected
/// even if the HMAC matches.
pub const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Processed webhook events older than this are swept.
pub const WEBHOOK_RETENTION_DAYS: i64 = 30;

/// Retries granted to a webhook event after its initial attempt. A
/// failure with the budget spent parks the event for manual retry.
pub const WEBHOOK_MAX_RETRIES: i32 = 3;

/// A data subject request must be resolved within this window.
pub const DSAR_SLA_HOURS: i64 = 72;

/// Age at which an unresolved data subject request starts counting as
/// "approaching" its deadline.
pub const DSAR_SLA_WARNING_HOURS: i64 = 48;

/// How long a generated export artifact link stays valid (7 days).
pub const EXPORT_LINK_EXPIRY_HOURS: i64 = 168;

/// Confirmation literal an operator must echo to approve a deletion
/// request. Guards against approving the wrong request from a list view.
pub const DELETE_CONFIRMATION_PHRASE: &str = "CONFIRM_DELETE";

/// Singapore GST rate in basis points (9% since 2024).
pub const GST_RATE_BASIS_POINTS: u32 = 900;

/// Header carrying the shared admin token for privileged endpoints.
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sla_warning_precedes_deadline() {
        assert!(DSAR_SLA_WARNING_HOURS < DSAR_SLA_HOURS);
    }

    #[test]
    fn test_export_link_expiry_is_seven_days() {
        assert_eq!(EXPORT_LINK_EXPIRY_HOURS, 7 * 24);
    }
}
