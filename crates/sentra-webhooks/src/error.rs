//! Error types for webhook ingress and administration.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sentra_db::DbError;
use serde::Serialize;
use utoipa::ToSchema;

/// Webhook ingress error variants.
#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("Webhook timestamp is invalid or outside the tolerance window")]
    StaleTimestamp,

    #[error("Webhook signature verification failed")]
    InvalidSignature,

    #[error("Invalid event envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Webhook event not found")]
    EventNotFound,

    #[error("Webhook event already processed")]
    AlreadyProcessed,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<DbError> for IngressError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(_) => IngressError::EventNotFound,
            DbError::StaleTransition(_) => IngressError::AlreadyProcessed,
            other => IngressError::Internal(other.to_string()),
        }
    }
}

/// JSON error response returned by webhook endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            IngressError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            IngressError::MissingHeader(_) => (StatusCode::BAD_REQUEST, "missing_header"),
            IngressError::StaleTimestamp => (StatusCode::BAD_REQUEST, "stale_timestamp"),
            IngressError::InvalidSignature => (StatusCode::BAD_REQUEST, "invalid_signature"),
            IngressError::InvalidEnvelope(_) => (StatusCode::BAD_REQUEST, "invalid_envelope"),
            IngressError::EventNotFound => (StatusCode::NOT_FOUND, "event_not_found"),
            IngressError::AlreadyProcessed => (StatusCode::CONFLICT, "already_processed"),
            IngressError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, IngressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_transition_maps_to_conflict() {
        let err: IngressError = DbError::StaleTransition("already done".to_string()).into();
        assert!(matches!(err, IngressError::AlreadyProcessed));
    }

    #[test]
    fn test_not_found_maps_to_event_not_found() {
        let err: IngressError = DbError::NotFound("gone".to_string()).into();
        assert!(matches!(err, IngressError::EventNotFound));
    }
}
