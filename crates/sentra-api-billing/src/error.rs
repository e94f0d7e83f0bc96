//! Error types for the billing API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sentra_core::constants::IDEMPOTENCY_KEY_HEADER;
use sentra_db::DbError;
use serde::Serialize;
use utoipa::ToSchema;

/// Billing endpoint error variants.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Missing required header: {0}")]
    MissingIdempotencyKey(&'static str),

    #[error("Invalid idempotency key: {0}")]
    InvalidIdempotencyKey(&'static str),

    #[error("Another request with this idempotency key is in flight or has failed")]
    KeyConflict,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invoice not found")]
    InvoiceNotFound,

    #[error("Invalid invoice state: {0}")]
    InvalidState(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<DbError> for BillingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(_) => BillingError::InvoiceNotFound,
            DbError::ValidationFailed(message) => BillingError::Validation(message),
            other => BillingError::Internal(other.to_string()),
        }
    }
}

/// JSON error response returned by billing endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,

    /// Header or body field the error points at, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl BillingError {
    fn parts(&self) -> (StatusCode, &'static str, Option<&'static str>) {
        match self {
            BillingError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None),
            BillingError::MissingIdempotencyKey(_) => (
                StatusCode::BAD_REQUEST,
                "missing_idempotency_key",
                Some(IDEMPOTENCY_KEY_HEADER),
            ),
            BillingError::InvalidIdempotencyKey(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_idempotency_key",
                Some(IDEMPOTENCY_KEY_HEADER),
            ),
            BillingError::KeyConflict => (StatusCode::CONFLICT, "idempotency_conflict", None),
            BillingError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error", None),
            BillingError::InvoiceNotFound => (StatusCode::NOT_FOUND, "invoice_not_found", None),
            BillingError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state", None),
            BillingError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        }
    }

    /// Status and serialized body, as the response and as the cacheable
    /// copy the idempotency record stores.
    #[must_use]
    pub fn response_parts(&self) -> (StatusCode, serde_json::Value) {
        let (status, error_type, field) = self.parts();
        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
            field: field.map(str::to_string),
        };
        (status, serde_json::to_value(body).unwrap_or_default())
    }
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        let (status, body) = self.response_parts();
        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_points_at_header() {
        let (status, body) =
            BillingError::MissingIdempotencyKey(IDEMPOTENCY_KEY_HEADER).response_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], serde_json::json!("Idempotency-Key"));
        assert_eq!(body["error"], serde_json::json!("missing_idempotency_key"));
    }

    #[test]
    fn test_key_conflict_is_409() {
        let (status, body) = BillingError::KeyConflict.response_parts();
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.get("field").is_none());
    }

    #[test]
    fn test_db_not_found_maps_to_invoice_not_found() {
        let err: BillingError = DbError::NotFound("gone".to_string()).into();
        assert!(matches!(err, BillingError::InvoiceNotFound));
    }
}
