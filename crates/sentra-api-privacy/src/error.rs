//! Error types for the privacy API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sentra_db::DbError;
use serde::Serialize;
use utoipa::ToSchema;

/// Privacy endpoint error variants.
#[derive(Debug, thiserror::Error)]
pub enum PrivacyError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<&'static str>,
    },

    #[error("Request not found")]
    RequestNotFound,

    #[error("Verification token does not match")]
    InvalidToken,

    /// The request is not in a state that accepts this verb. Always a
    /// 400: the caller misunderstands the lifecycle, the resource is
    /// fine.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl PrivacyError {
    pub fn validation(message: impl Into<String>, field: Option<&'static str>) -> Self {
        PrivacyError::Validation {
            message: message.into(),
            field,
        }
    }
}

impl From<DbError> for PrivacyError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(_) => PrivacyError::RequestNotFound,
            DbError::StaleTransition(message) => PrivacyError::InvalidTransition(message),
            DbError::ValidationFailed(message) => PrivacyError::Validation {
                message,
                field: None,
            },
            other => PrivacyError::Internal(other.to_string()),
        }
    }
}

/// JSON error response returned by privacy endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,

    /// Body field the error points at, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl PrivacyError {
    fn parts(&self) -> (StatusCode, &'static str, Option<&'static str>) {
        match self {
            PrivacyError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None),
            PrivacyError::Validation { field, .. } => {
                (StatusCode::BAD_REQUEST, "validation_error", *field)
            }
            PrivacyError::RequestNotFound => (StatusCode::NOT_FOUND, "request_not_found", None),
            PrivacyError::InvalidToken => (StatusCode::BAD_REQUEST, "invalid_token", None),
            PrivacyError::InvalidTransition(_) => {
                (StatusCode::BAD_REQUEST, "invalid_transition", None)
            }
            PrivacyError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        }
    }
}

impl IntoResponse for PrivacyError {
    fn into_response(self) -> Response {
        let (status, error_type, field) = self.parts();
        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
            field: field.map(str::to_string),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, PrivacyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_carries_field_pointer() {
        let err = PrivacyError::validation("email must contain @", Some("email"));
        let (status, error_type, field) = err.parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_type, "validation_error");
        assert_eq!(field, Some("email"));
    }

    #[test]
    fn test_stale_transition_maps_to_400() {
        let err: PrivacyError = DbError::StaleTransition("dsar x is not pending".to_string()).into();
        let (status, error_type, _) = err.parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_type, "invalid_transition");
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err: PrivacyError = DbError::NotFound("dsar".to_string()).into();
        let (status, _, _) = err.parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
