//! Router-level tests for privacy rejection paths.
//!
//! Every case here is decided before any query runs, so the state is
//! built on a lazy pool with no database behind it.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use sentra_api_privacy::router::{admin_router, public_router, PrivacyState};
use sentra_core::notify::MockEmailSender;
use tower::ServiceExt;

fn test_state() -> PrivacyState {
    let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused").unwrap();
    PrivacyState::new(pool, Arc::new(MockEmailSender::new()))
}

async fn post(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn test_create_rejects_implausible_email() {
    let body = serde_json::json!({"email": "not-an-address", "request_type": "export"});
    let (status, json) = post(public_router(test_state()), "/privacy/dsar", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["field"], "email");
}

#[tokio::test]
async fn test_create_rejects_unknown_request_type() {
    let body = serde_json::json!({"email": "subject@example.com", "request_type": "purge"});
    let (status, json) = post(public_router(test_state()), "/privacy/dsar", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["field"], "request_type");
}

#[tokio::test]
async fn test_approve_rejects_wrong_confirmation_phrase() {
    let body = serde_json::json!({
        "confirmation": "confirm_delete",
        "approver_id": "5f0f8de4-3240-4b32-a34c-8c04e4e0c01a",
    });
    let uri = "/privacy/dsar/9d31566c-45ba-4f9c-96cd-6f915e9cc1ad/approve-delete";
    let (status, json) = post(admin_router(test_state()), uri, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["field"], "confirmation");
}
