//! Request and response DTOs for privacy endpoints.

use chrono::{DateTime, Utc};
use sentra_db::models::{DsarRequest, DsarRequestType, NewDsarRequest, SlaCounts, SlaStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::PrivacyError;

/// Body for `POST /privacy/dsar`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateDsarRequest {
    /// Address of the data subject; the verification mail goes here.
    #[schema(example = "subject@example.com")]
    pub email: String,

    /// One of `export`, `delete`, `access`, `rectification`.
    #[schema(example = "export")]
    pub request_type: String,

    /// Free-text detail from the subject.
    #[serde(default)]
    pub details: String,
}

impl CreateDsarRequest {
    /// Validate and convert into the model input.
    ///
    /// The subject is unauthenticated, so nothing in the body is trusted
    /// to name a platform user; matching a user account to the address
    /// happens out of band.
    pub fn validate(&self) -> Result<NewDsarRequest, PrivacyError> {
        let email = self.email.trim();
        if email.is_empty() || email.len() > 254 || !well_formed_email(email) {
            return Err(PrivacyError::validation(
                "email must be a plausible address",
                Some("email"),
            ));
        }

        let request_type: DsarRequestType = self.request_type.parse().map_err(|_| {
            PrivacyError::validation(
                "request_type must be one of export, delete, access, rectification",
                Some("request_type"),
            )
        })?;

        Ok(NewDsarRequest {
            email: email.to_string(),
            user_id: None,
            request_type,
            details: self.details.clone(),
        })
    }
}

/// Just enough shape to catch typos; deliverability is proven by the
/// verification mail, not by parsing.
fn well_formed_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.starts_with('.')
        }
        None => false,
    }
}

/// Body for `POST /privacy/dsar/{id}/verify`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerifyDsarRequest {
    /// Token from the verification email.
    pub token: Uuid,
}

/// Body for `POST /privacy/dsar/{id}/approve-delete`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ApproveDeleteRequest {
    /// Must be exactly `CONFIRM_DELETE`.
    #[schema(example = "CONFIRM_DELETE")]
    pub confirmation: String,

    /// Operator taking responsibility for the deletion.
    pub approver_id: Uuid,
}

/// A data subject request as exposed by the API.
///
/// The verification token never appears here; it reaches the subject
/// only through their mailbox.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DsarResponse {
    pub id: Uuid,
    pub email: String,
    pub request_type: String,
    pub status: String,
    /// Derived bucket against the 72-hour window, as of the request.
    #[schema(example = "within")]
    pub sla_status: String,
    pub details: String,
    pub verified_at: Option<DateTime<Utc>>,
    pub deletion_approved_by: Option<Uuid>,
    pub deletion_approved_at: Option<DateTime<Utc>>,
    pub export_url: Option<String>,
    pub export_expires_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl DsarResponse {
    #[must_use]
    pub fn from_request(request: DsarRequest, at: DateTime<Utc>) -> Self {
        let sla_status = sla_label(request.sla_status(at)).to_string();
        Self {
            id: request.id,
            email: request.email,
            request_type: request.request_type,
            status: request.status,
            sla_status,
            details: request.details,
            verified_at: request.verified_at,
            deletion_approved_by: request.deletion_approved_by,
            deletion_approved_at: request.deletion_approved_at,
            export_url: request.export_url,
            export_expires_at: request.export_expires_at,
            failure_reason: request.failure_reason,
            created_at: request.created_at,
            processed_at: request.processed_at,
        }
    }
}

fn sla_label(sla: SlaStatus) -> &'static str {
    match sla {
        SlaStatus::Within => "within",
        SlaStatus::Approaching => "approaching",
        SlaStatus::Breached => "breached",
        SlaStatus::Completed => "completed",
    }
}

/// Body for `GET /privacy/dsar/sla-dashboard`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlaDashboardResponse {
    pub within_sla: i64,
    pub approaching_sla: i64,
    pub breached_sla: i64,
    /// Verified delete requests still waiting for an operator.
    pub pending_approval: i64,
}

impl From<SlaCounts> for SlaDashboardResponse {
    fn from(counts: SlaCounts) -> Self {
        Self {
            within_sla: counts.within_sla,
            approaching_sla: counts.approaching_sla,
            breached_sla: counts.breached_sla,
            pending_approval: counts.pending_approval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, request_type: &str) -> CreateDsarRequest {
        CreateDsarRequest {
            email: email.to_string(),
            request_type: request_type.to_string(),
            details: String::new(),
        }
    }

    #[test]
    fn test_validate_accepts_plain_address() {
        let input = request("subject@example.com", "export").validate().unwrap();
        assert_eq!(input.email, "subject@example.com");
        assert_eq!(input.request_type, DsarRequestType::Export);
        assert!(input.user_id.is_none());
    }

    #[test]
    fn test_validate_trims_whitespace() {
        let input = request("  subject@example.com ", "delete").validate().unwrap();
        assert_eq!(input.email, "subject@example.com");
    }

    #[test]
    fn test_validate_rejects_bad_addresses() {
        for email in ["", "no-at-sign", "@example.com", "local@", "a@.com"] {
            let err = request(email, "export").validate().unwrap_err();
            assert!(matches!(
                err,
                PrivacyError::Validation {
                    field: Some("email"),
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let err = request("subject@example.com", "purge").validate().unwrap_err();
        assert!(matches!(
            err,
            PrivacyError::Validation {
                field: Some("request_type"),
                ..
            }
        ));
    }

    #[test]
    fn test_details_default_to_empty() {
        let parsed: CreateDsarRequest = serde_json::from_value(serde_json::json!({
            "email": "subject@example.com",
            "request_type": "access",
        }))
        .unwrap();
        assert_eq!(parsed.details, "");
    }
}
