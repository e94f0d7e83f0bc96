//! Sentra core API server.
//!
//! Receives signed webhooks from external services, serves the
//! idempotent billing and data subject request endpoints, and runs the
//! background reconciliation worker. Admin routes are gated on the
//! `X-Admin-Token` header; health probes back the deployment platform.

mod config;
mod health;
mod logging;
mod middleware;
mod openapi;

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use config::Config;
use health::{health_routes, HealthState};
use middleware::{require_admin_token, AdminGate};
use openapi::swagger_routes;
use sentra_api_billing::{billing_router, BillingState};
use sentra_api_privacy::{
    admin_router as privacy_admin_router, public_router as privacy_public_router, PrivacyState,
};
use sentra_core::{EmailSender, LogEmailSender};
use sentra_db::{run_migrations, DbPool};
use sentra_webhooks::{admin_router as webhook_admin_router, ingress_router, WebhooksState};
use sentra_worker::ReconcileWorker;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Requests larger than this are refused before reaching a handler.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() {
    // Load configuration (fail-fast on missing required values)
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        env = %config.app_env,
        "Starting sentra core API"
    );

    // Validate security configuration
    match config.validate_security_config() {
        Ok(warnings) => {
            for warning in &warnings {
                tracing::warn!(target: "security", "{}", warning);
            }
            if !warnings.is_empty() {
                tracing::warn!(
                    target: "security",
                    count = warnings.len(),
                    "Insecure default values detected (allowed in {} mode)",
                    config.app_env
                );
            }
        }
        Err(errors) => {
            for error in &errors {
                tracing::error!(target: "security", "{}", error);
            }
            eprintln!(
                "FATAL: {} insecure default(s) detected in production mode. \
                 Set proper secrets or use APP_ENV=development.",
                errors.len()
            );
            std::process::exit(1);
        }
    }

    if config.webhook_secrets.is_empty() {
        tracing::warn!(
            "No WEBHOOK_SECRET_<SERVICE> variables set; webhook ingress will reject all deliveries"
        );
    } else {
        let mut services: Vec<&str> = config.webhook_secrets.keys().map(String::as_str).collect();
        services.sort_unstable();
        info!(services = ?services, "Webhook ingress configured");
    }

    // Create database connection pool and apply migrations
    let pool = match DbPool::connect(&config.database_url).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_migrations(&pool).await {
        tracing::error!("Failed to run database migrations: {e}");
        std::process::exit(1);
    }
    info!("Database migrations applied");

    let pg = pool.inner().clone();
    let email_sender: Arc<dyn EmailSender> = Arc::new(LogEmailSender::new());
    let shutting_down = Arc::new(AtomicBool::new(false));

    // Background reconciliation worker
    let worker = Arc::new(ReconcileWorker::new(
        pg.clone(),
        email_sender.clone(),
        config.export_base_url.clone(),
        config.worker.clone(),
    ));
    let worker_handle = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.run().await })
    };
    info!(
        concurrency = config.worker.concurrency,
        "Reconciliation worker started"
    );

    // Route composition: public surface, then admin surface behind the gate
    let webhooks_state = WebhooksState::new(pg.clone(), config.webhook_secrets.clone());
    let billing_state = BillingState::new(pg.clone());
    let privacy_state = PrivacyState::new(pg.clone(), email_sender);
    let gate = AdminGate::new(config.admin_token.clone());

    let admin_routes = Router::new()
        .merge(webhook_admin_router(webhooks_state.clone()))
        .merge(billing_router(billing_state))
        .merge(privacy_admin_router(privacy_state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            gate,
            require_admin_token,
        ));

    let app = Router::new()
        .merge(health_routes(HealthState::new(
            pg.clone(),
            shutting_down.clone(),
        )))
        .merge(ingress_router(webhooks_state))
        .merge(privacy_public_router(privacy_state))
        .merge(admin_routes)
        .merge(swagger_routes())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http());

    // Bind and serve
    let addr: SocketAddr = match config.bind_addr().parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid bind address '{}': {e}", config.bind_addr());
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, "Server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutting_down))
        .await
    {
        tracing::error!("Server error: {e}");
    }

    // Drain the worker after the HTTP surface has gone quiet
    worker.shutdown();
    if let Err(e) = worker_handle.await {
        tracing::error!("Worker task failed: {e}");
    }

    info!("Server shutdown complete");
}

/// Resolve on Ctrl+C or SIGTERM and flip the readiness flag so the
/// platform stops routing traffic while connections drain.
async fn shutdown_signal(shutting_down: Arc<AtomicBool>) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
                // Fall through - we still want to wait for terminate signal
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                // Wait forever if we can't install the handler
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    shutting_down.store(true, std::sync::atomic::Ordering::Release);
    info!("Readiness probe set to unhealthy, draining traffic");
}

/// Build CORS layer from configured origins.
///
/// When explicit origins are configured (non-wildcard), rejected origins
/// are logged as structured security events and credentials are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    use tower_http::cors::AllowOrigin;

    let is_wildcard = origins.len() == 1 && origins[0] == "*";

    let allow_origin = if is_wildcard {
        AllowOrigin::any()
    } else {
        let allowed: Vec<axum::http::HeaderValue> =
            origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _req: &axum::http::request::Parts| {
                let is_allowed = allowed.contains(origin);
                if !is_allowed {
                    let origin_str = origin.to_str().unwrap_or("<non-utf8>");
                    tracing::warn!(
                        target: "security",
                        origin = %origin_str,
                        "CORS origin rejected"
                    );
                }
                is_allowed
            },
        )
    };

    let mut layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .max_age(Duration::from_secs(3600));

    if is_wildcard {
        layer = layer.allow_methods(Any).allow_headers(Any);
    } else {
        use axum::http::header::{ACCEPT, CONTENT_TYPE, ORIGIN};
        use axum::http::{HeaderName, Method};
        layer = layer
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                CONTENT_TYPE,
                ACCEPT,
                ORIGIN,
                HeaderName::from_static("x-admin-token"),
                HeaderName::from_static("idempotency-key"),
            ])
            .allow_credentials(true);
    }

    layer
}
