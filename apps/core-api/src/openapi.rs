//! `OpenAPI` documentation and Swagger UI configuration.
//!
//! This module sets up utoipa for `OpenAPI` spec generation and
//! configures Swagger UI for interactive API documentation.

use axum::Router;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::health::{HealthResponse, ReadinessResponse};

/// Security scheme modifier for the admin token header.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "adminToken",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                sentra_core::constants::ADMIN_TOKEN_HEADER,
            ))),
        );
    }
}

/// `OpenAPI` documentation for the sentra core API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sentra Core API",
        version = "0.4.0",
        description = "Webhook reconciliation, idempotent billing, and data subject request backend",
        contact(name = "Sentra Team")
    ),
    servers(
        (url = "http://localhost:8080", description = "Development server")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health and status"),
        (name = "Webhooks", description = "Signed webhook ingress and stored event administration"),
        (name = "Billing", description = "Idempotent invoice operations"),
        (name = "Privacy", description = "Data subject request lifecycle and SLA tracking")
    ),
    paths(
        // Health
        crate::health::health_handler,
        crate::health::ready_handler,
        // Webhooks
        sentra_webhooks::handlers::ingress::receive_webhook_handler,
        sentra_webhooks::handlers::admin::list_events_handler,
        sentra_webhooks::handlers::admin::retry_event_handler,
        // Billing
        sentra_api_billing::handlers::invoices::create_invoice_handler,
        sentra_api_billing::handlers::invoices::pay_invoice_handler,
        sentra_api_billing::handlers::invoices::void_invoice_handler,
        // Privacy
        sentra_api_privacy::handlers::dsar::create_dsar_handler,
        sentra_api_privacy::handlers::dsar::verify_dsar_handler,
        sentra_api_privacy::handlers::dsar::approve_delete_handler,
        sentra_api_privacy::handlers::dsar::get_dsar_handler,
        sentra_api_privacy::handlers::dsar::sla_dashboard_handler,
    ),
    components(schemas(
        // Health
        HealthResponse,
        ReadinessResponse,
        // Webhooks
        sentra_webhooks::IngressAck,
        sentra_webhooks::models::WebhookEventResponse,
        sentra_webhooks::models::WebhookEventListResponse,
        // Billing
        sentra_api_billing::CreateInvoiceRequest,
        sentra_api_billing::PayInvoiceRequest,
        sentra_api_billing::InvoiceResponse,
        // The error envelope is identical across the API crates; register one.
        sentra_api_billing::ErrorResponse,
        // Privacy
        sentra_api_privacy::CreateDsarRequest,
        sentra_api_privacy::VerifyDsarRequest,
        sentra_api_privacy::ApproveDeleteRequest,
        sentra_api_privacy::DsarResponse,
        sentra_api_privacy::SlaDashboardResponse,
    ))
)]
pub struct ApiDoc;

/// Create Swagger UI routes.
pub fn swagger_routes() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().expect("Should serialize to JSON");
        assert!(json.contains("Sentra Core API"));
        assert!(json.contains("/health"));
    }

    #[test]
    fn test_openapi_contains_all_endpoint_groups() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        // Health
        assert!(paths.contains_key("/health"), "Missing /health endpoint");
        assert!(paths.contains_key("/ready"), "Missing /ready endpoint");

        // Webhooks
        assert!(
            paths.contains_key("/webhooks/{service}"),
            "Missing webhook ingress endpoint"
        );
        assert!(
            paths.contains_key("/admin/webhook-events"),
            "Missing webhook event listing endpoint"
        );
        assert!(
            paths.contains_key("/admin/webhook-events/{id}/retry"),
            "Missing webhook retry endpoint"
        );

        // Billing
        assert!(
            paths.contains_key("/billing/invoices"),
            "Missing invoice create endpoint"
        );
        assert!(
            paths.contains_key("/billing/invoices/{id}/pay"),
            "Missing invoice pay endpoint"
        );
        assert!(
            paths.contains_key("/billing/invoices/{id}/void"),
            "Missing invoice void endpoint"
        );

        // Privacy
        assert!(
            paths.contains_key("/privacy/dsar"),
            "Missing DSAR create endpoint"
        );
        assert!(
            paths.contains_key("/privacy/dsar/{id}/verify"),
            "Missing DSAR verify endpoint"
        );
        assert!(
            paths.contains_key("/privacy/dsar/{id}/approve-delete"),
            "Missing DSAR approval endpoint"
        );
        assert!(
            paths.contains_key("/privacy/dsar/sla-dashboard"),
            "Missing SLA dashboard endpoint"
        );
    }

    #[test]
    fn test_openapi_has_components() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().unwrap().schemas;
        assert!(schemas.contains_key("HealthResponse"));
        assert!(schemas.contains_key("IngressAck"));
        assert!(schemas.contains_key("InvoiceResponse"));
        assert!(schemas.contains_key("DsarResponse"));
        assert!(schemas.contains_key("ErrorResponse"));
    }

    #[test]
    fn test_openapi_registers_admin_token_scheme() {
        let doc = ApiDoc::openapi();
        let schemes = &doc.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("adminToken"));
    }
}
