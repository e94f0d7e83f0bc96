//! Axum router setup for webhook endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;

use crate::handlers::{admin, ingress};
use crate::services::IngressService;

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct WebhooksState {
    ingress: Arc<IngressService>,
    pool: PgPool,
}

impl WebhooksState {
    /// Create a new webhooks state with per-service shared secrets.
    #[must_use]
    pub fn new(pool: PgPool, secrets: HashMap<String, String>) -> Self {
        Self {
            ingress: Arc::new(IngressService::new(pool.clone(), secrets)),
            pool,
        }
    }

    /// Get a reference to the database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the ingress service.
    #[must_use]
    pub fn ingress(&self) -> &IngressService {
        &self.ingress
    }
}

/// Public receiver routes. No authentication beyond the payload
/// signature itself.
pub fn ingress_router(state: WebhooksState) -> Router {
    Router::new()
        .route("/webhooks/:service", post(ingress::receive_webhook_handler))
        .with_state(state)
}

/// Administrative routes. The caller mounts these behind the admin
/// token middleware.
pub fn admin_router(state: WebhooksState) -> Router {
    Router::new()
        .route("/admin/webhook-events", get(admin::list_events_handler))
        .route(
            "/admin/webhook-events/:id/retry",
            post(admin::retry_event_handler),
        )
        .with_state(state)
}
