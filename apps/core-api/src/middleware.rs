//! Admin token gate for the privileged surface.
//!
//! Every route mounted behind this middleware requires the configured
//! operator secret in the `X-Admin-Token` header. The comparison is
//! constant-time.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sentra_core::constants::ADMIN_TOKEN_HEADER;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Shared secret the admin routes are gated on.
#[derive(Clone)]
pub struct AdminGate {
    token: Arc<String>,
}

impl AdminGate {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token: Arc::new(token),
        }
    }

    /// Constant-time comparison against the configured token.
    fn accepts(&self, presented: &str) -> bool {
        presented.as_bytes().ct_eq(self.token.as_bytes()).into()
    }
}

/// Reject requests that do not carry the configured admin token.
pub async fn require_admin_token(
    State(gate): State<AdminGate>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match presented {
        Some(token) if gate.accepts(token) => next.run(request).await,
        Some(_) => {
            warn!(
                target: "security",
                path = %request.uri().path(),
                "Admin token rejected"
            );
            unauthorized("invalid admin token")
        }
        None => {
            warn!(
                target: "security",
                path = %request.uri().path(),
                "Admin token missing"
            );
            unauthorized("missing admin token")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    let body = json!({
        "error": "unauthorized",
        "message": message,
        "status": 401,
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn gated_app(token: &str) -> Router {
        let gate = AdminGate::new(token.to_string());
        Router::new()
            .route("/admin/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(
                gate,
                require_admin_token,
            ))
    }

    #[test]
    fn accepts_matches_exactly() {
        let gate = AdminGate::new("operator-secret".to_string());
        assert!(gate.accepts("operator-secret"));
        assert!(!gate.accepts("operator-secre"));
        assert!(!gate.accepts("operator-secret-x"));
        assert!(!gate.accepts(""));
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = gated_app("operator-secret");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(body["status"], 401);
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized() {
        let app = gated_app("operator-secret");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin/ping")
                    .header(ADMIN_TOKEN_HEADER, "guessed-secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_token_passes_through() {
        let app = gated_app("operator-secret");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin/ping")
                    .header(ADMIN_TOKEN_HEADER, "operator-secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
