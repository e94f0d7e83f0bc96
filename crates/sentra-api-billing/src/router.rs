//! Axum router setup for billing endpoints.

use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use sqlx::PgPool;

use crate::handlers::invoices;
use crate::services::IdempotencyGuard;

/// Shared state for billing handlers.
#[derive(Clone)]
pub struct BillingState {
    guard: Arc<IdempotencyGuard>,
    pool: PgPool,
}

impl BillingState {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            guard: Arc::new(IdempotencyGuard::new(pool.clone())),
            pool,
        }
    }

    /// Get a reference to the database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the idempotency guard.
    #[must_use]
    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }
}

/// Billing mutation routes. The caller mounts these behind the admin
/// token middleware.
pub fn billing_router(state: BillingState) -> Router {
    Router::new()
        .route("/billing/invoices", post(invoices::create_invoice_handler))
        .route(
            "/billing/invoices/:id/pay",
            post(invoices::pay_invoice_handler),
        )
        .route(
            "/billing/invoices/:id/void",
            post(invoices::void_invoice_handler),
        )
        .with_state(state)
}
