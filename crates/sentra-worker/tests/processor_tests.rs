//! Integration tests for webhook event reconciliation.
//!
//! These tests require a running PostgreSQL instance.
//! Run with: `cargo test -p sentra-worker --features integration`
//!
//! Events are admitted through the real dedup path and handed to the
//! processor one attempt at a time, reloading the row between attempts
//! the way the poll loop would.

#![cfg(feature = "integration")]

mod common;

use chrono::{DateTime, Duration, Utc};
use common::{provider_payload, TestContext};
use sentra_db::models::{AuditEvent, Invoice, Subscription, WebhookEvent};
use sentra_worker::processor::{process_event, Outcome};
use serde_json::json;
use uuid::Uuid;

const MAX_RETRIES: i32 = 3;

/// Newest audit entry of `event_type` whose data carries `key == value`.
async fn audit_entry_for(
    ctx: &TestContext,
    event_type: &str,
    key: &str,
    value: &serde_json::Value,
) -> Option<AuditEvent> {
    AuditEvent::list_by_type(ctx.pool.inner(), event_type, 200)
        .await
        .unwrap()
        .into_iter()
        .find(|entry| entry.data.get(key) == Some(value))
}

#[tokio::test]
async fn test_paid_event_applies_effect_and_audit() {
    let ctx = TestContext::new().await;
    let ext = format!("in_{}", Uuid::new_v4());
    let invoice_id = ctx.insert_invoice("open", 10900, Some(&ext)).await;
    let event = ctx
        .admit_event(
            "payments",
            "invoice.paid",
            provider_payload("invoice.paid", json!({"id": ext, "amount_paid": 10900})),
        )
        .await;

    let outcome = process_event(ctx.pool.inner(), &event, MAX_RETRIES, Utc::now()).await;
    assert_eq!(outcome, Outcome::Processed);

    let stored = ctx.reload_event(event.id).await;
    assert!(stored.processed);
    assert!(stored.processed_at.is_some());

    let invoice = Invoice::find_by_id(ctx.pool.inner(), invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoice.status, "paid");
    assert_eq!(invoice.amount_paid_cents, 10900);
    assert!(invoice.paid_at.is_some());

    let audit = audit_entry_for(&ctx, "invoice.paid", "external_invoice_id", &json!(ext))
        .await
        .expect("audit row must commit with the effect");
    assert_eq!(audit.data["invoice_id"], json!(invoice_id));
    assert_eq!(audit.data["amount_paid_cents"], json!(10900));
    assert_eq!(audit.organization_id, Some(invoice.organization_id));
}

#[tokio::test]
async fn test_failing_event_recovers_with_two_retries_spent() {
    let ctx = TestContext::new().await;
    let ext = format!("in_{}", Uuid::new_v4());
    // amount_paid missing: classification fails until the payload is
    // repaired upstream.
    let event = ctx
        .admit_event(
            "payments",
            "invoice.paid",
            provider_payload("invoice.paid", json!({"id": ext})),
        )
        .await;

    let first = process_event(ctx.pool.inner(), &event, MAX_RETRIES, Utc::now()).await;
    assert_eq!(
        first,
        Outcome::Retry {
            delay: Duration::seconds(60)
        }
    );
    let after_first = ctx.reload_event(event.id).await;
    assert_eq!(after_first.retry_count, 1);
    assert!(!after_first.processed);
    assert!(after_first.processing_error.is_some());

    let second = process_event(ctx.pool.inner(), &after_first, MAX_RETRIES, Utc::now()).await;
    assert_eq!(
        second,
        Outcome::Retry {
            delay: Duration::seconds(120)
        }
    );
    let after_second = ctx.reload_event(event.id).await;
    assert_eq!(after_second.retry_count, 2);

    // Repair the payload and seed the invoice it references.
    ctx.insert_invoice("open", 5450, Some(&ext)).await;
    sqlx::query("UPDATE webhook_events SET payload = $2 WHERE id = $1")
        .bind(event.id)
        .bind(provider_payload(
            "invoice.paid",
            json!({"id": ext, "amount_paid": 5450}),
        ))
        .execute(ctx.pool.inner())
        .await
        .unwrap();

    let repaired = ctx.reload_event(event.id).await;
    let third = process_event(ctx.pool.inner(), &repaired, MAX_RETRIES, Utc::now()).await;
    assert_eq!(third, Outcome::Processed);

    // Success after two failures: the count stays at two.
    let final_row = ctx.reload_event(event.id).await;
    assert!(final_row.processed);
    assert_eq!(final_row.retry_count, 2);
}

#[tokio::test]
async fn test_spent_budget_parks_event_until_manual_retry() {
    let ctx = TestContext::new().await;
    let ext = format!("in_{}", Uuid::new_v4());
    let event = ctx
        .admit_event(
            "payments",
            "invoice.paid",
            provider_payload("invoice.paid", json!({"id": ext})),
        )
        .await;

    let mut outcomes = Vec::new();
    for _ in 0..4 {
        let row = ctx.reload_event(event.id).await;
        outcomes.push(process_event(ctx.pool.inner(), &row, MAX_RETRIES, Utc::now()).await);
    }
    assert_eq!(
        outcomes,
        vec![
            Outcome::Retry {
                delay: Duration::seconds(60)
            },
            Outcome::Retry {
                delay: Duration::seconds(120)
            },
            Outcome::Retry {
                delay: Duration::seconds(240)
            },
            Outcome::GivenUp,
        ]
    );

    let parked = ctx.reload_event(event.id).await;
    assert!(!parked.processed);
    assert_eq!(parked.retry_count, 4);
    assert!(parked.next_retry_at.is_none());
    assert!(parked.is_given_up(MAX_RETRIES));

    // The poller no longer claims it.
    let claimed = WebhookEvent::claim_due_batch(ctx.pool.inner(), Utc::now(), MAX_RETRIES, 60, 500)
        .await
        .unwrap();
    assert!(!claimed.iter().any(|e| e.id == parked.id));
}

#[tokio::test]
async fn test_unknown_event_type_is_acknowledged_as_noop() {
    let ctx = TestContext::new().await;
    let payload = json!({"id": format!("evt_{}", Uuid::new_v4()), "type": "charge.refunded"});
    let event = ctx.admit_event("payments", "charge.refunded", payload).await;

    let outcome = process_event(ctx.pool.inner(), &event, MAX_RETRIES, Utc::now()).await;
    assert_eq!(outcome, Outcome::Processed);

    let stored = ctx.reload_event(event.id).await;
    assert!(stored.processed);
    assert_eq!(stored.retry_count, 0);
}

#[tokio::test]
async fn test_paid_event_for_unknown_invoice_succeeds_without_audit() {
    let ctx = TestContext::new().await;
    let ext = format!("in_missing_{}", Uuid::new_v4());
    let event = ctx
        .admit_event(
            "payments",
            "invoice.paid",
            provider_payload("invoice.paid", json!({"id": ext, "amount_paid": 900})),
        )
        .await;

    // Retrying would never make the invoice appear, so this is success.
    let outcome = process_event(ctx.pool.inner(), &event, MAX_RETRIES, Utc::now()).await;
    assert_eq!(outcome, Outcome::Processed);
    assert!(ctx.reload_event(event.id).await.processed);

    let audit = audit_entry_for(&ctx, "invoice.paid", "external_invoice_id", &json!(ext)).await;
    assert!(audit.is_none());
}

#[tokio::test]
async fn test_redelivered_payment_keeps_first_paid_at() {
    let ctx = TestContext::new().await;
    let ext = format!("in_{}", Uuid::new_v4());
    let invoice_id = ctx.insert_invoice("open", 10900, Some(&ext)).await;
    let object = json!({"id": ext, "amount_paid": 10900});

    let first_event = ctx
        .admit_event(
            "payments",
            "invoice.paid",
            provider_payload("invoice.paid", object.clone()),
        )
        .await;
    process_event(ctx.pool.inner(), &first_event, MAX_RETRIES, Utc::now()).await;
    let paid_first = Invoice::find_by_id(ctx.pool.inner(), invoice_id)
        .await
        .unwrap()
        .unwrap()
        .paid_at
        .expect("first event records payment");

    // Same provider object under a fresh event id, as the provider does
    // when it re-sends history.
    let second_event = ctx
        .admit_event(
            "payments",
            "invoice.paid",
            provider_payload("invoice.paid", object),
        )
        .await;
    let outcome = process_event(ctx.pool.inner(), &second_event, MAX_RETRIES, Utc::now()).await;
    assert_eq!(outcome, Outcome::Processed);

    let invoice = Invoice::find_by_id(ctx.pool.inner(), invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoice.status, "paid");
    assert_eq!(invoice.paid_at, Some(paid_first));
}

#[tokio::test]
async fn test_payment_failed_reopens_invoice_and_audits() {
    let ctx = TestContext::new().await;
    let ext = format!("in_{}", Uuid::new_v4());
    let invoice_id = ctx.insert_invoice("draft", 10900, Some(&ext)).await;
    let event = ctx
        .admit_event(
            "payments",
            "invoice.payment_failed",
            provider_payload("invoice.payment_failed", json!({"id": ext})),
        )
        .await;

    let outcome = process_event(ctx.pool.inner(), &event, MAX_RETRIES, Utc::now()).await;
    assert_eq!(outcome, Outcome::Processed);

    let invoice = Invoice::find_by_id(ctx.pool.inner(), invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoice.status, "open");

    let audit = audit_entry_for(&ctx, "invoice.payment_failed", "invoice_id", &json!(invoice_id))
        .await;
    assert!(audit.is_some());
}

#[tokio::test]
async fn test_stale_payment_failure_never_unseats_payment() {
    let ctx = TestContext::new().await;
    let ext = format!("in_{}", Uuid::new_v4());
    let invoice_id = ctx.insert_invoice("paid", 10900, Some(&ext)).await;
    let event = ctx
        .admit_event(
            "payments",
            "invoice.payment_failed",
            provider_payload("invoice.payment_failed", json!({"id": ext})),
        )
        .await;

    let outcome = process_event(ctx.pool.inner(), &event, MAX_RETRIES, Utc::now()).await;
    assert_eq!(outcome, Outcome::Processed);

    let invoice = Invoice::find_by_id(ctx.pool.inner(), invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoice.status, "paid");

    let audit = audit_entry_for(&ctx, "invoice.payment_failed", "invoice_id", &json!(invoice_id))
        .await;
    assert!(audit.is_none(), "out-of-order failure must not audit");
}

#[tokio::test]
async fn test_subscription_update_applies() {
    let ctx = TestContext::new().await;
    let ext = format!("sub_{}", Uuid::new_v4());
    ctx.insert_subscription(&ext, "active").await;
    let event = ctx
        .admit_event(
            "payments",
            "customer.subscription.updated",
            provider_payload(
                "customer.subscription.updated",
                json!({"id": ext, "status": "past_due", "current_period_end": 1_760_000_000}),
            ),
        )
        .await;

    let outcome = process_event(ctx.pool.inner(), &event, MAX_RETRIES, Utc::now()).await;
    assert_eq!(outcome, Outcome::Processed);

    let subscription = Subscription::find_by_external_id(ctx.pool.inner(), &ext)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, "past_due");
    assert_eq!(
        subscription.current_period_end,
        DateTime::from_timestamp(1_760_000_000, 0)
    );
}

#[tokio::test]
async fn test_subscription_update_with_unmapped_status_is_noop() {
    let ctx = TestContext::new().await;
    let ext = format!("sub_{}", Uuid::new_v4());
    ctx.insert_subscription(&ext, "active").await;
    let event = ctx
        .admit_event(
            "payments",
            "customer.subscription.updated",
            provider_payload(
                "customer.subscription.updated",
                json!({"id": ext, "status": "trialing"}),
            ),
        )
        .await;

    // A status outside our model acks without touching the row rather
    // than burning the retry budget on a payload that will never parse.
    let outcome = process_event(ctx.pool.inner(), &event, MAX_RETRIES, Utc::now()).await;
    assert_eq!(outcome, Outcome::Processed);

    let subscription = Subscription::find_by_external_id(ctx.pool.inner(), &ext)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, "active");
}

#[tokio::test]
async fn test_subscription_deleted_cancels() {
    let ctx = TestContext::new().await;
    let ext = format!("sub_{}", Uuid::new_v4());
    ctx.insert_subscription(&ext, "active").await;
    let event = ctx
        .admit_event(
            "payments",
            "customer.subscription.deleted",
            provider_payload("customer.subscription.deleted", json!({"id": ext})),
        )
        .await;

    let outcome = process_event(ctx.pool.inner(), &event, MAX_RETRIES, Utc::now()).await;
    assert_eq!(outcome, Outcome::Processed);

    let subscription = Subscription::find_by_external_id(ctx.pool.inner(), &ext)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, "canceled");
    assert!(subscription.canceled_at.is_some());
}
