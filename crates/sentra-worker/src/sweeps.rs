//! Periodic maintenance sweeps.
//!
//! Each sweep is independent; a failure is logged and the remaining
//! sweeps still run. Quiet passes stay out of the logs.

use chrono::{DateTime, Duration, Utc};
use sentra_db::models::{
    AuditEvent, DsarRequest, IdempotencyRecord, RecordAuditEvent, WebhookEvent,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info, warn};

/// Run every sweep once.
pub async fn run_all(pool: &PgPool, retention_days: i64, now: DateTime<Utc>) {
    match IdempotencyRecord::delete_expired(pool, now).await {
        Ok(count) if count > 0 => {
            info!(target: "sweep", count, "Deleted expired idempotency records");
        }
        Ok(_) => {}
        Err(e) => {
            error!(target: "sweep", error = %e, "Failed to delete expired idempotency records");
        }
    }

    let cutoff = now - Duration::days(retention_days);
    match WebhookEvent::delete_processed_before(pool, cutoff).await {
        Ok(count) if count > 0 => {
            info!(target: "sweep", count, "Deleted processed webhook events past retention");
        }
        Ok(_) => {}
        Err(e) => {
            error!(target: "sweep", error = %e, "Failed to delete old webhook events");
        }
    }

    match expire_export_links(pool, now).await {
        Ok(count) if count > 0 => {
            info!(target: "sweep", count, "Expired export links");
        }
        Ok(_) => {}
        Err(e) => {
            error!(target: "sweep", error = %e, "Failed to expire export links");
        }
    }

    match DsarRequest::sla_counts(pool, now).await {
        Ok(counts) if counts.approaching_sla > 0 || counts.breached_sla > 0 => {
            warn!(
                target: "sweep",
                approaching = counts.approaching_sla,
                breached = counts.breached_sla,
                "Open data subject requests near or past the resolution deadline"
            );
        }
        Ok(_) => {}
        Err(e) => {
            error!(target: "sweep", error = %e, "Failed to compute SLA counts");
        }
    }
}

/// Null out expired export links, one audit row per affected request.
async fn expire_export_links(pool: &PgPool, now: DateTime<Utc>) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let expired = DsarRequest::expire_export_links(&mut *tx, now).await?;
    for request_id in &expired {
        AuditEvent::record(
            &mut *tx,
            &RecordAuditEvent {
                event_type: "dsar.export_expired".to_string(),
                user_id: None,
                organization_id: None,
                data: json!({ "request_id": request_id }),
            },
        )
        .await?;
    }
    tx.commit().await?;
    Ok(expired.len())
}
