//! Axum router setup for privacy endpoints.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sentra_core::notify::EmailSender;
use sqlx::PgPool;

use crate::handlers::dsar;

/// Shared state for privacy handlers.
#[derive(Clone)]
pub struct PrivacyState {
    pool: PgPool,
    email_sender: Arc<dyn EmailSender>,
}

impl PrivacyState {
    #[must_use]
    pub fn new(pool: PgPool, email_sender: Arc<dyn EmailSender>) -> Self {
        Self { pool, email_sender }
    }

    /// Get a reference to the database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the outbound email backend.
    #[must_use]
    pub fn email_sender(&self) -> &dyn EmailSender {
        self.email_sender.as_ref()
    }
}

/// Public routes: lodging and verifying requests. The subject proves
/// mailbox ownership with the emailed token, nothing more.
pub fn public_router(state: PrivacyState) -> Router {
    Router::new()
        .route("/privacy/dsar", post(dsar::create_dsar_handler))
        .route("/privacy/dsar/:id/verify", post(dsar::verify_dsar_handler))
        .with_state(state)
}

/// Administrative routes. The caller mounts these behind the admin
/// token middleware.
pub fn admin_router(state: PrivacyState) -> Router {
    Router::new()
        .route(
            "/privacy/dsar/sla-dashboard",
            get(dsar::sla_dashboard_handler),
        )
        .route("/privacy/dsar/:id", get(dsar::get_dsar_handler))
        .route(
            "/privacy/dsar/:id/approve-delete",
            post(dsar::approve_delete_handler),
        )
        .with_state(state)
}
