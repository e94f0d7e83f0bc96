//! Public webhook receiver.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use sentra_core::constants::{WEBHOOK_SIGNATURE_HEADER, WEBHOOK_TIMESTAMP_HEADER};

use crate::error::ApiResult;
use crate::models::IngressAck;
use crate::router::WebhooksState;

/// Receive a signed webhook delivery from an external service.
#[utoipa::path(
    post,
    path = "/webhooks/{service}",
    tag = "Webhooks",
    params(
        ("service" = String, Path, description = "Source service name"),
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Delivery acknowledged", body = IngressAck),
        (status = 400, description = "Bad signature, stale timestamp, or invalid envelope"),
    ),
)]
pub async fn receive_webhook_handler(
    State(state): State<WebhooksState>,
    Path(service): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<IngressAck>> {
    let timestamp = header_str(&headers, WEBHOOK_TIMESTAMP_HEADER);
    let signature = header_str(&headers, WEBHOOK_SIGNATURE_HEADER);

    let ack = state
        .ingress()
        .ingest(&service, timestamp, signature, &body, Utc::now())
        .await?;
    Ok(Json(ack))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
