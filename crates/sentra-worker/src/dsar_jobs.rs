//! Background resolution of data subject requests.
//!
//! A pass claims `processing` requests with row locks held for the whole
//! transaction, resolves each one, and commits everything together.
//! Completion emails go out only after the commit succeeds; a send
//! failure is logged, never rolled back, since the resolution itself is
//! the durable fact.

use chrono::{DateTime, Duration, Utc};
use sentra_core::constants::EXPORT_LINK_EXPIRY_HOURS;
use sentra_core::notify::EmailSender;
use sentra_db::models::{AuditEvent, DsarRequest, DsarRequestType, RecordAuditEvent};
use sentra_db::DbError;
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, instrument, warn};
use uuid::Uuid;

/// Email captured during the pass, delivered after commit.
struct CompletionNotice {
    email: String,
    request_id: Uuid,
    export_url: Option<String>,
}

/// Build the artifact link for a resolved export-style request.
#[must_use]
pub fn export_link(export_base_url: &str, request_id: Uuid) -> String {
    format!(
        "{}/{}.json",
        export_base_url.trim_end_matches('/'),
        request_id
    )
}

/// Resolve one batch of `processing` requests. Returns how many were
/// resolved (completed or failed).
#[instrument(skip_all, fields(batch_size = batch_size))]
pub async fn run_dsar_pass(
    pool: &PgPool,
    email_sender: &dyn EmailSender,
    export_base_url: &str,
    batch_size: i32,
    now: DateTime<Utc>,
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let batch = DsarRequest::claim_processing_batch(&mut *tx, batch_size).await?;
    if batch.is_empty() {
        tx.commit().await?;
        return Ok(0);
    }

    let mut notices: Vec<CompletionNotice> = Vec::with_capacity(batch.len());
    for request in &batch {
        match request.request_type_enum() {
            Some(DsarRequestType::Delete) if !request.is_approved() => {
                // The API guards this path; a row can still get here if
                // the approval was revoked by hand. Never delete data
                // without a recorded approver.
                DsarRequest::fail(&mut *tx, request.id, "deletion not approved").await?;
                warn!(
                    request_id = %request.id,
                    "Deletion request reached the worker without approval, failing"
                );
            }
            Some(DsarRequestType::Delete) => {
                DsarRequest::complete(&mut *tx, request.id, None, None, now).await?;
                AuditEvent::record(
                    &mut *tx,
                    &RecordAuditEvent {
                        event_type: "dsar.deletion_completed".to_string(),
                        user_id: request.deletion_approved_by,
                        organization_id: None,
                        data: json!({
                            "request_id": request.id,
                            "approved_by": request.deletion_approved_by,
                        }),
                    },
                )
                .await?;
                notices.push(CompletionNotice {
                    email: request.email.clone(),
                    request_id: request.id,
                    export_url: None,
                });
            }
            Some(request_type) => {
                let export_url = export_link(export_base_url, request.id);
                let expires_at = now + Duration::hours(EXPORT_LINK_EXPIRY_HOURS);
                DsarRequest::complete(&mut *tx, request.id, Some(&export_url), Some(expires_at), now)
                    .await?;
                AuditEvent::record(
                    &mut *tx,
                    &RecordAuditEvent {
                        event_type: "dsar.completed".to_string(),
                        user_id: None,
                        organization_id: None,
                        data: json!({
                            "request_id": request.id,
                            "request_type": request_type.to_string(),
                        }),
                    },
                )
                .await?;
                notices.push(CompletionNotice {
                    email: request.email.clone(),
                    request_id: request.id,
                    export_url: Some(export_url),
                });
            }
            None => {
                // Unreachable while the table's CHECK holds.
                DsarRequest::fail(&mut *tx, request.id, "unknown request type").await?;
                warn!(
                    request_id = %request.id,
                    request_type = %request.request_type,
                    "Request with unrecognized type, failing"
                );
            }
        }
    }

    let resolved = batch.len();
    tx.commit().await?;

    for notice in &notices {
        if let Err(e) = email_sender
            .send_dsar_completion(&notice.email, notice.request_id, notice.export_url.as_deref())
            .await
        {
            error!(
                request_id = %notice.request_id,
                error = %e,
                "Failed to send completion email"
            );
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_link_format() {
        let id = Uuid::new_v4();
        assert_eq!(
            export_link("https://exports.example.com/dsar", id),
            format!("https://exports.example.com/dsar/{id}.json")
        );
    }

    #[test]
    fn test_export_link_tolerates_trailing_slash() {
        let id = Uuid::new_v4();
        assert_eq!(
            export_link("https://exports.example.com/dsar/", id),
            format!("https://exports.example.com/dsar/{id}.json")
        );
    }
}
