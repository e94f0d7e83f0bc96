//! Appliers for known payment events.
//!
//! Every applier runs on the caller's transaction so the state change
//! and its audit record commit (or roll back) together with the event's
//! processed flag. Appliers are idempotent at the row level: fields are
//! set, never incremented, so a replayed effect lands on the same state.
//!
//! A referenced invoice or subscription that does not exist locally is
//! logged and counts as success; retrying would never make it appear.

use chrono::{DateTime, Utc};
use sentra_db::models::{
    AuditEvent, Invoice, RecordAuditEvent, Subscription, SubscriptionStatus,
};
use sentra_webhooks::event::PaymentEvent;
use serde_json::json;
use sqlx::{Postgres, Transaction};
use tracing::warn;

/// Apply one classified event on the given transaction.
pub async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    event: &PaymentEvent,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    match event {
        PaymentEvent::InvoicePaid {
            external_invoice_id,
            amount_paid_cents,
        } => invoice_paid(tx, external_invoice_id, *amount_paid_cents, now).await,
        PaymentEvent::InvoicePaymentFailed { external_invoice_id } => {
            invoice_payment_failed(tx, external_invoice_id, now).await
        }
        PaymentEvent::SubscriptionUpdated {
            external_subscription_id,
            status,
            current_period_end,
        } => {
            subscription_updated(tx, external_subscription_id, status, *current_period_end, now)
                .await
        }
        PaymentEvent::SubscriptionDeleted {
            external_subscription_id,
        } => subscription_deleted(tx, external_subscription_id, now).await,
        PaymentEvent::Unknown { .. } => Ok(()),
    }
}

async fn invoice_paid(
    tx: &mut Transaction<'_, Postgres>,
    external_invoice_id: &str,
    amount_paid_cents: i64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let Some(invoice) = Invoice::find_by_external_id(&mut **tx, external_invoice_id).await? else {
        warn!(
            external_invoice_id = %external_invoice_id,
            "Payment event references an unknown invoice, skipping"
        );
        return Ok(());
    };

    let Some(paid) = Invoice::mark_paid(&mut **tx, invoice.id, amount_paid_cents, now).await?
    else {
        warn!(
            invoice_id = %invoice.id,
            "Payment event for a void invoice, skipping"
        );
        return Ok(());
    };

    AuditEvent::record(
        &mut **tx,
        &RecordAuditEvent {
            event_type: "invoice.paid".to_string(),
            user_id: None,
            organization_id: Some(paid.organization_id),
            data: json!({
                "invoice_id": paid.id,
                "invoice_number": paid.invoice_number,
                "external_invoice_id": external_invoice_id,
                "amount_paid_cents": amount_paid_cents,
            }),
        },
    )
    .await?;
    Ok(())
}

async fn invoice_payment_failed(
    tx: &mut Transaction<'_, Postgres>,
    external_invoice_id: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let Some(invoice) = Invoice::find_by_external_id(&mut **tx, external_invoice_id).await? else {
        warn!(
            external_invoice_id = %external_invoice_id,
            "Payment failure event references an unknown invoice, skipping"
        );
        return Ok(());
    };

    let affected = Invoice::mark_payment_failed(&mut **tx, invoice.id, now).await?;
    if affected == 0 {
        // Already paid or void; the failure event arrived out of order.
        warn!(
            invoice_id = %invoice.id,
            status = %invoice.status,
            "Payment failure event for a settled invoice, skipping"
        );
        return Ok(());
    }

    AuditEvent::record(
        &mut **tx,
        &RecordAuditEvent {
            event_type: "invoice.payment_failed".to_string(),
            user_id: None,
            organization_id: Some(invoice.organization_id),
            data: json!({
                "invoice_id": invoice.id,
                "invoice_number": invoice.invoice_number,
                "external_invoice_id": external_invoice_id,
            }),
        },
    )
    .await?;
    Ok(())
}

async fn subscription_updated(
    tx: &mut Transaction<'_, Postgres>,
    external_subscription_id: &str,
    status: &str,
    current_period_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let Ok(parsed) = status.parse::<SubscriptionStatus>() else {
        warn!(
            external_subscription_id = %external_subscription_id,
            provider_status = %status,
            "Unmapped subscription status, skipping"
        );
        return Ok(());
    };

    let affected = Subscription::update_from_event(
        &mut **tx,
        external_subscription_id,
        parsed,
        current_period_end,
        now,
    )
    .await?;
    if affected == 0 {
        warn!(
            external_subscription_id = %external_subscription_id,
            "Subscription event references an unknown subscription, skipping"
        );
    }
    Ok(())
}

async fn subscription_deleted(
    tx: &mut Transaction<'_, Postgres>,
    external_subscription_id: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let affected =
        Subscription::cancel_by_external_id(&mut **tx, external_subscription_id, now).await?;
    if affected == 0 {
        warn!(
            external_subscription_id = %external_subscription_id,
            "Cancellation event references an unknown subscription, skipping"
        );
    }
    Ok(())
}
