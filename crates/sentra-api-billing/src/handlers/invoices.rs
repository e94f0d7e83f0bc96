//! Guarded invoice mutations.
//!
//! Every endpoint here requires an `Idempotency-Key` header. The
//! guard's claim runs before any parsing so a replayed request never
//! re-validates; business rejections are recorded on the key exactly
//! like successes so a retry sees the same 4xx it saw the first time.
//! Only infrastructure errors burn the key.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use sentra_core::constants::{GST_RATE_BASIS_POINTS, IDEMPOTENCY_KEY_HEADER};
use sentra_core::money::InvoiceTotals;
use sentra_db::models::invoice::format_invoice_number;
use sentra_db::models::{AuditEvent, Invoice, NewInvoice, RecordAuditEvent};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{ApiResult, BillingError, ErrorResponse};
use crate::models::{CreateInvoiceRequest, InvoiceResponse, PayInvoiceRequest};
use crate::router::BillingState;
use crate::services::{validate_key, GuardOutcome, IdempotencyGuard};

/// Create an invoice with GST computed from the subtotal.
#[utoipa::path(
    post,
    path = "/billing/invoices",
    tag = "Billing",
    params(
        ("Idempotency-Key" = String, Header, description = "Client-chosen key; retries with the same key replay the first response"),
    ),
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = InvoiceResponse),
        (status = 400, description = "Missing or invalid idempotency key, or validation failure", body = ErrorResponse),
        (status = 409, description = "Key held by an in-flight or failed request", body = ErrorResponse),
    ),
)]
pub async fn create_invoice_handler(
    State(state): State<BillingState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let key = match claim_key(&state, &headers, "POST", "/billing/invoices", &body).await? {
        Guarded::Proceed { key } => key,
        Guarded::Short(response) => return Ok(response),
    };

    finish(state.pool(), &key, create_invoice(state.pool(), &key, &body)).await
}

/// Mark an invoice paid.
#[utoipa::path(
    post,
    path = "/billing/invoices/{id}/pay",
    tag = "Billing",
    params(
        ("id" = Uuid, Path, description = "Invoice id"),
        ("Idempotency-Key" = String, Header, description = "Client-chosen key; retries with the same key replay the first response"),
    ),
    request_body = PayInvoiceRequest,
    responses(
        (status = 200, description = "Invoice paid", body = InvoiceResponse),
        (status = 400, description = "Missing or invalid idempotency key, or validation failure", body = ErrorResponse),
        (status = 404, description = "No such invoice", body = ErrorResponse),
        (status = 409, description = "Void invoice, or key held by another request", body = ErrorResponse),
    ),
)]
pub async fn pay_invoice_handler(
    State(state): State<BillingState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let path = format!("/billing/invoices/{id}/pay");
    let key = match claim_key(&state, &headers, "POST", &path, &body).await? {
        Guarded::Proceed { key } => key,
        Guarded::Short(response) => return Ok(response),
    };

    finish(state.pool(), &key, pay_invoice(state.pool(), &key, id, &body)).await
}

/// Void a draft or open invoice.
#[utoipa::path(
    post,
    path = "/billing/invoices/{id}/void",
    tag = "Billing",
    params(
        ("id" = Uuid, Path, description = "Invoice id"),
        ("Idempotency-Key" = String, Header, description = "Client-chosen key; retries with the same key replay the first response"),
    ),
    responses(
        (status = 200, description = "Invoice voided", body = InvoiceResponse),
        (status = 400, description = "Missing or invalid idempotency key", body = ErrorResponse),
        (status = 404, description = "No such invoice", body = ErrorResponse),
        (status = 409, description = "Paid invoice, or key held by another request", body = ErrorResponse),
    ),
)]
pub async fn void_invoice_handler(
    State(state): State<BillingState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let path = format!("/billing/invoices/{id}/void");
    let key = match claim_key(&state, &headers, "POST", &path, &body).await? {
        Guarded::Proceed { key } => key,
        Guarded::Short(response) => return Ok(response),
    };

    finish(state.pool(), &key, void_invoice(state.pool(), &key, id)).await
}

/// Result of the pre-flight key claim.
enum Guarded {
    /// Key claimed; the caller runs the effect and records the outcome.
    Proceed { key: String },
    /// Replay of a recorded response; return it as-is.
    Short(Response),
}

async fn claim_key(
    state: &BillingState,
    headers: &HeaderMap,
    method: &str,
    path: &str,
    body: &[u8],
) -> ApiResult<Guarded> {
    let value = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .ok_or(BillingError::MissingIdempotencyKey(IDEMPOTENCY_KEY_HEADER))?;
    let key = value
        .to_str()
        .map_err(|_| BillingError::InvalidIdempotencyKey("key must be visible ASCII"))?;
    validate_key(key).map_err(BillingError::InvalidIdempotencyKey)?;

    match state.guard().begin(key, method, path, body, Utc::now()).await? {
        GuardOutcome::Proceed => Ok(Guarded::Proceed {
            key: key.to_string(),
        }),
        GuardOutcome::Replay { status, body } => {
            info!(key, status = status.as_u16(), "Replaying recorded response");
            Ok(Guarded::Short((status, Json(body)).into_response()))
        }
        GuardOutcome::Conflict => Err(BillingError::KeyConflict),
    }
}

/// Await the effect; an error burns the claimed key so retries get a
/// clean 409 instead of a stuck `processing` row.
async fn finish(
    pool: &PgPool,
    key: &str,
    effect: impl std::future::Future<Output = ApiResult<Response>>,
) -> ApiResult<Response> {
    match effect.await {
        Ok(response) => Ok(response),
        Err(error) => {
            if let Err(burn_error) = IdempotencyGuard::fail(pool, key).await {
                error!(key, error = %burn_error, "Failed to mark idempotency key failed");
            }
            Err(error)
        }
    }
}

/// Record a business rejection on the key and return it, so a retry
/// replays the identical 4xx.
async fn reject(pool: &PgPool, key: &str, error: BillingError) -> ApiResult<Response> {
    let (status, body) = error.response_parts();
    IdempotencyGuard::complete(pool, key, status, &body).await?;
    Ok((status, Json(body)).into_response())
}

/// Commit the effect, its audit entry, and the recorded response as one
/// transaction.
async fn respond(
    mut tx: Transaction<'_, Postgres>,
    key: &str,
    status: StatusCode,
    invoice: Invoice,
) -> ApiResult<Response> {
    let body = serde_json::to_value(InvoiceResponse::from(invoice))
        .map_err(|error| BillingError::Internal(error.to_string()))?;
    IdempotencyGuard::complete(&mut *tx, key, status, &body).await?;
    tx.commit().await?;
    Ok((status, Json(body)).into_response())
}

async fn create_invoice(pool: &PgPool, key: &str, body: &[u8]) -> ApiResult<Response> {
    let request: CreateInvoiceRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(error) => {
            let message = format!("invalid request body: {error}");
            return reject(pool, key, BillingError::Validation(message)).await;
        }
    };

    if request.subtotal_cents < 0 {
        let message = "subtotal_cents must be non-negative".to_string();
        return reject(pool, key, BillingError::Validation(message)).await;
    }

    let now = Utc::now();
    let totals = InvoiceTotals::compute(request.subtotal_cents, GST_RATE_BASIS_POINTS);

    let mut tx = pool.begin().await?;

    // Concurrent creates can race to the same sequence number; the
    // unique index on invoice_number turns the loser into an error and
    // the client retries with the same key.
    let seq = Invoice::count_issued_in_month(&mut *tx, now).await? + 1;
    let invoice = Invoice::create(
        &mut *tx,
        &NewInvoice {
            organization_id: request.organization_id,
            invoice_number: format_invoice_number(now, seq),
            currency: request.currency,
            subtotal_cents: totals.subtotal_cents,
            gst_amount_cents: totals.gst_amount_cents,
            total_cents: totals.total_cents,
            due_at: request.due_at,
            external_invoice_id: request.external_invoice_id,
        },
    )
    .await?;

    AuditEvent::record(
        &mut *tx,
        &RecordAuditEvent {
            event_type: "invoice.created".to_string(),
            user_id: None,
            organization_id: Some(invoice.organization_id),
            data: serde_json::json!({
                "invoice_id": invoice.id,
                "invoice_number": invoice.invoice_number,
                "subtotal_cents": invoice.subtotal_cents,
                "gst_amount_cents": invoice.gst_amount_cents,
                "total_cents": invoice.total_cents,
            }),
        },
    )
    .await?;

    info!(
        invoice_id = %invoice.id,
        invoice_number = %invoice.invoice_number,
        total_cents = invoice.total_cents,
        "Invoice created"
    );
    respond(tx, key, StatusCode::CREATED, invoice).await
}

async fn pay_invoice(pool: &PgPool, key: &str, id: Uuid, body: &[u8]) -> ApiResult<Response> {
    let request = if body.is_empty() {
        PayInvoiceRequest::default()
    } else {
        match serde_json::from_slice::<PayInvoiceRequest>(body) {
            Ok(request) => request,
            Err(error) => {
                let message = format!("invalid request body: {error}");
                return reject(pool, key, BillingError::Validation(message)).await;
            }
        }
    };

    if matches!(request.amount_paid_cents, Some(amount) if amount < 0) {
        let message = "amount_paid_cents must be non-negative".to_string();
        return reject(pool, key, BillingError::Validation(message)).await;
    }

    let Some(invoice) = Invoice::find_by_id(pool, id).await? else {
        return reject(pool, key, BillingError::InvoiceNotFound).await;
    };
    let amount = request.amount_paid_cents.unwrap_or(invoice.total_cents);
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    // The UPDATE's own status guard is authoritative; the lookup above
    // only distinguished 404 from 409.
    let Some(paid) = Invoice::mark_paid(&mut *tx, id, amount, now).await? else {
        tx.rollback().await?;
        let message = "void invoices cannot be paid".to_string();
        return reject(pool, key, BillingError::InvalidState(message)).await;
    };

    AuditEvent::record(
        &mut *tx,
        &RecordAuditEvent {
            event_type: "invoice.paid".to_string(),
            user_id: None,
            organization_id: Some(paid.organization_id),
            data: serde_json::json!({
                "invoice_id": paid.id,
                "invoice_number": paid.invoice_number,
                "amount_paid_cents": paid.amount_paid_cents,
            }),
        },
    )
    .await?;

    info!(
        invoice_id = %paid.id,
        amount_paid_cents = paid.amount_paid_cents,
        "Invoice paid"
    );
    respond(tx, key, StatusCode::OK, paid).await
}

async fn void_invoice(pool: &PgPool, key: &str, id: Uuid) -> ApiResult<Response> {
    if Invoice::find_by_id(pool, id).await?.is_none() {
        return reject(pool, key, BillingError::InvoiceNotFound).await;
    }
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let Some(voided) = Invoice::mark_void(&mut *tx, id, now).await? else {
        tx.rollback().await?;
        let message = "only draft or open invoices can be voided".to_string();
        return reject(pool, key, BillingError::InvalidState(message)).await;
    };

    AuditEvent::record(
        &mut *tx,
        &RecordAuditEvent {
            event_type: "invoice.voided".to_string(),
            user_id: None,
            organization_id: Some(voided.organization_id),
            data: serde_json::json!({
                "invoice_id": voided.id,
                "invoice_number": voided.invoice_number,
            }),
        },
    )
    .await?;

    info!(invoice_id = %voided.id, "Invoice voided");
    respond(tx, key, StatusCode::OK, voided).await
}
