//! Administrative webhook event handlers.
//!
//! Mounted behind the admin token middleware by the application router.

use axum::extract::{Path, Query, State};
use axum::Json;
use sentra_core::constants::WEBHOOK_MAX_RETRIES;
use sentra_db::models::{WebhookEvent, WebhookEventFilter};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiResult, IngressError};
use crate::models::{ListEventsQuery, WebhookEventListResponse, WebhookEventResponse};
use crate::router::WebhooksState;

/// List stored webhook events, newest first.
#[utoipa::path(
    get,
    path = "/admin/webhook-events",
    tag = "Webhooks",
    params(ListEventsQuery),
    responses(
        (status = 200, description = "Paginated event list", body = WebhookEventListResponse),
        (status = 401, description = "Missing or invalid admin token"),
    ),
)]
pub async fn list_events_handler(
    State(state): State<WebhooksState>,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult<Json<WebhookEventListResponse>> {
    let limit = query.limit.clamp(1, 100);
    let filter = WebhookEventFilter {
        service: query.service,
        event_type: query.event_type,
        processed: query.processed,
    };

    let events = WebhookEvent::list(state.pool(), &filter, query.cursor, limit).await?;

    let next_cursor = if events.len() == limit as usize {
        events.last().map(|event| event.created_at)
    } else {
        None
    };
    let items = events.into_iter().map(event_to_response).collect();

    Ok(Json(WebhookEventListResponse { items, next_cursor }))
}

/// Reset a given-up event so the worker retries it.
#[utoipa::path(
    post,
    path = "/admin/webhook-events/{id}/retry",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook event ID"),
    ),
    responses(
        (status = 200, description = "Event queued for retry", body = WebhookEventResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Event already processed"),
    ),
)]
pub async fn retry_event_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookEventResponse>> {
    let event = WebhookEvent::find_by_id(state.pool(), id)
        .await?
        .ok_or(IngressError::EventNotFound)?;
    if event.processed {
        return Err(IngressError::AlreadyProcessed);
    }

    let reset = WebhookEvent::reset_for_retry(state.pool(), id).await?;
    info!(
        id = %id,
        service = %reset.service,
        event_id = %reset.event_id,
        "Webhook event reset for manual retry"
    );

    Ok(Json(event_to_response(reset)))
}

/// Convert a DB event model to its admin response.
fn event_to_response(event: WebhookEvent) -> WebhookEventResponse {
    let given_up = event.is_given_up(WEBHOOK_MAX_RETRIES);
    WebhookEventResponse {
        id: event.id,
        service: event.service,
        event_id: event.event_id,
        event_type: event.event_type,
        payload: event.payload,
        processed: event.processed,
        processed_at: event.processed_at,
        processing_error: event.processing_error,
        retry_count: event.retry_count,
        given_up,
        last_retry_at: event.last_retry_at,
        next_retry_at: event.next_retry_at,
        created_at: event.created_at,
    }
}
