//! Router-level tests for webhook receiver rejection paths.
//!
//! Every case here is decided before the event is admitted, so the
//! state is built on a lazy pool with no database behind it.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use sentra_webhooks::crypto::compute_signature;
use sentra_webhooks::router::{ingress_router, WebhooksState};
use tower::ServiceExt;

const SECRET: &str = "test-webhook-secret";

fn test_state() -> WebhooksState {
    let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused").unwrap();
    let mut secrets = HashMap::new();
    secrets.insert("payments".to_string(), SECRET.to_string());
    WebhooksState::new(pool, secrets)
}

async fn deliver(
    service: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &str,
) -> (StatusCode, serde_json::Value) {
    let app = ingress_router(test_state());

    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/webhooks/{service}"))
        .header("content-type", "application/json");
    if let Some(ts) = timestamp {
        builder = builder.header("X-Webhook-Timestamp", ts);
    }
    if let Some(sig) = signature {
        builder = builder.header("X-Webhook-Signature", sig);
    }

    let response = app
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

fn signed(ts: i64, body: &str) -> (String, String) {
    let timestamp = ts.to_string();
    let signature = compute_signature(SECRET, &timestamp, body.as_bytes());
    (timestamp, signature)
}

#[tokio::test]
async fn test_unknown_service_acknowledged_without_processing() {
    let (status, json) = deliver("not-configured", None, None, "{}").await;

    // 200 so the provider stops redelivering; the status string tells
    // the operator what went wrong.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "configuration_error");
}

#[tokio::test]
async fn test_missing_signature_header_rejected() {
    let (status, json) = deliver("payments", Some("1760000000"), None, "{}").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "missing_header");
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let now = Utc::now().timestamp();
    let body = r#"{"id":"evt_1","type":"invoice.paid"}"#;
    let signature = compute_signature("wrong-secret", &now.to_string(), body.as_bytes());

    let (status, json) =
        deliver("payments", Some(&now.to_string()), Some(&signature), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_signature");
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let stale = Utc::now().timestamp() - 600;
    let body = r#"{"id":"evt_1","type":"invoice.paid"}"#;
    let (ts, sig) = signed(stale, body);

    let (status, json) = deliver("payments", Some(&ts), Some(&sig), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "stale_timestamp");
}

#[tokio::test]
async fn test_malformed_body_rejected_after_authentication() {
    let body = "not json";
    let (ts, sig) = signed(Utc::now().timestamp(), body);

    let (status, json) = deliver("payments", Some(&ts), Some(&sig), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_envelope");
}

#[tokio::test]
async fn test_envelope_without_event_id_rejected() {
    let body = r#"{"type":"invoice.paid"}"#;
    let (ts, sig) = signed(Utc::now().timestamp(), body);

    let (status, json) = deliver("payments", Some(&ts), Some(&sig), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_envelope");
}

#[tokio::test]
async fn test_inline_timestamp_accepted_for_authentication() {
    // Authentication passes via the t=..,v1=.. header alone; the request
    // then fails on the envelope, proving it got past the signature check.
    let now = Utc::now().timestamp();
    let body = r#"{"type":"invoice.paid"}"#;
    let sig = compute_signature(SECRET, &now.to_string(), body.as_bytes());
    let header = format!("t={now},v1={sig}");

    let (status, json) = deliver("payments", None, Some(&header), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_envelope");
}
