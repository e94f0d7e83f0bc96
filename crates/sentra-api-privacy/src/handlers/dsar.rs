//! DSAR lifecycle handlers.
//!
//! The lifecycle verbs on the model are conditional updates, so every
//! handler here can pre-read for friendly error messages and still rely
//! on the verb itself as the atomic arbiter under concurrent calls.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use sentra_core::constants::DELETE_CONFIRMATION_PHRASE;
use sentra_db::models::{AuditEvent, DsarRequest, DsarRequestType, RecordAuditEvent};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{ApiResult, ErrorResponse, PrivacyError};
use crate::models::{
    ApproveDeleteRequest, CreateDsarRequest, DsarResponse, SlaDashboardResponse, VerifyDsarRequest,
};
use crate::router::PrivacyState;

/// Lodge a data subject request.
#[utoipa::path(
    post,
    path = "/privacy/dsar",
    tag = "Privacy",
    request_body = CreateDsarRequest,
    responses(
        (status = 201, description = "Request lodged; verification email sent", body = DsarResponse),
        (status = 400, description = "Invalid email or request type", body = ErrorResponse),
    ),
)]
pub async fn create_dsar_handler(
    State(state): State<PrivacyState>,
    Json(body): Json<CreateDsarRequest>,
) -> ApiResult<(StatusCode, Json<DsarResponse>)> {
    let input = body.validate()?;
    let now = Utc::now();

    let mut tx = state.pool().begin().await?;
    let request = DsarRequest::create(&mut *tx, &input).await?;
    AuditEvent::record(
        &mut *tx,
        &RecordAuditEvent {
            event_type: "dsar.created".to_string(),
            user_id: None,
            organization_id: None,
            data: serde_json::json!({
                "request_id": request.id,
                "request_type": request.request_type,
            }),
        },
    )
    .await?;
    tx.commit().await?;

    // Post-commit: a failed send must not roll back the request. The
    // token stays valid, so support can resend it.
    if let Err(send_error) = state
        .email_sender()
        .send_dsar_verification(&request.email, request.id, request.verification_token)
        .await
    {
        error!(
            request_id = %request.id,
            error = %send_error,
            "Failed to send verification email"
        );
    }

    info!(
        request_id = %request.id,
        request_type = %request.request_type,
        "Data subject request lodged"
    );
    Ok((
        StatusCode::CREATED,
        Json(DsarResponse::from_request(request, now)),
    ))
}

/// Prove mailbox ownership with the emailed token.
#[utoipa::path(
    post,
    path = "/privacy/dsar/{id}/verify",
    tag = "Privacy",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = VerifyDsarRequest,
    responses(
        (status = 200, description = "Verified; non-delete requests start processing", body = DsarResponse),
        (status = 400, description = "Wrong token, or request is not pending", body = ErrorResponse),
        (status = 404, description = "No such request", body = ErrorResponse),
    ),
)]
pub async fn verify_dsar_handler(
    State(state): State<PrivacyState>,
    Path(id): Path<Uuid>,
    Json(body): Json<VerifyDsarRequest>,
) -> ApiResult<Json<DsarResponse>> {
    let now = Utc::now();
    let request = DsarRequest::find_by_id(state.pool(), id)
        .await?
        .ok_or(PrivacyError::RequestNotFound)?;

    if body.token != request.verification_token {
        return Err(PrivacyError::InvalidToken);
    }

    let mut tx = state.pool().begin().await?;
    let mut verified = DsarRequest::verify(&mut *tx, id, now).await?;

    // Only deletions wait for an operator; everything else goes straight
    // into the worker's queue.
    let auto_start = verified
        .request_type_enum()
        .is_some_and(|request_type| !request_type.requires_approval());
    if auto_start {
        verified = DsarRequest::start_processing(&mut *tx, id).await?;
    }
    tx.commit().await?;

    info!(request_id = %id, status = %verified.status, "Data subject request verified");
    Ok(Json(DsarResponse::from_request(verified, now)))
}

/// Operator sign-off on a verified deletion request.
#[utoipa::path(
    post,
    path = "/privacy/dsar/{id}/approve-delete",
    tag = "Privacy",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = ApproveDeleteRequest,
    responses(
        (status = 200, description = "Approved; the request starts processing", body = DsarResponse),
        (status = 400, description = "Bad confirmation phrase, non-delete request, unverified, or already approved", body = ErrorResponse),
        (status = 404, description = "No such request", body = ErrorResponse),
    ),
)]
pub async fn approve_delete_handler(
    State(state): State<PrivacyState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ApproveDeleteRequest>,
) -> ApiResult<Json<DsarResponse>> {
    if body.confirmation != DELETE_CONFIRMATION_PHRASE {
        return Err(PrivacyError::validation(
            "confirmation must be exactly CONFIRM_DELETE",
            Some("confirmation"),
        ));
    }

    let now = Utc::now();
    let request = DsarRequest::find_by_id(state.pool(), id)
        .await?
        .ok_or(PrivacyError::RequestNotFound)?;

    if request.request_type_enum() != Some(DsarRequestType::Delete) {
        return Err(PrivacyError::InvalidTransition(
            "only delete requests take deletion approval".to_string(),
        ));
    }
    if !request.is_verified() {
        return Err(PrivacyError::InvalidTransition(
            "request is not verified".to_string(),
        ));
    }
    if request.is_approved() {
        return Err(PrivacyError::InvalidTransition(
            "deletion is already approved".to_string(),
        ));
    }

    let mut tx = state.pool().begin().await?;
    DsarRequest::approve_deletion(&mut *tx, id, body.approver_id, now).await?;
    AuditEvent::record(
        &mut *tx,
        &RecordAuditEvent {
            event_type: "dsar.deletion_approved".to_string(),
            user_id: Some(body.approver_id),
            organization_id: None,
            data: serde_json::json!({
                "request_id": id,
                "approved_by": body.approver_id,
            }),
        },
    )
    .await?;
    let processing = DsarRequest::start_processing(&mut *tx, id).await?;
    tx.commit().await?;

    info!(
        request_id = %id,
        approved_by = %body.approver_id,
        "Deletion approved"
    );
    Ok(Json(DsarResponse::from_request(processing, now)))
}

/// Inspect a single request.
#[utoipa::path(
    get,
    path = "/privacy/dsar/{id}",
    tag = "Privacy",
    params(("id" = Uuid, Path, description = "Request id")),
    responses(
        (status = 200, description = "The request", body = DsarResponse),
        (status = 404, description = "No such request", body = ErrorResponse),
    ),
)]
pub async fn get_dsar_handler(
    State(state): State<PrivacyState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DsarResponse>> {
    let request = DsarRequest::find_by_id(state.pool(), id)
        .await?
        .ok_or(PrivacyError::RequestNotFound)?;
    Ok(Json(DsarResponse::from_request(request, Utc::now())))
}

/// SLA buckets over open requests.
#[utoipa::path(
    get,
    path = "/privacy/dsar/sla-dashboard",
    tag = "Privacy",
    responses(
        (status = 200, description = "Counts per bucket", body = SlaDashboardResponse),
    ),
)]
pub async fn sla_dashboard_handler(
    State(state): State<PrivacyState>,
) -> ApiResult<Json<SlaDashboardResponse>> {
    let counts = DsarRequest::sla_counts(state.pool(), Utc::now()).await?;
    Ok(Json(counts.into()))
}
