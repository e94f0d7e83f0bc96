//! Request and response DTOs for billing endpoints.

use chrono::{DateTime, Utc};
use sentra_db::models::Invoice;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Body for `POST /billing/invoices`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    /// Organization the invoice bills.
    pub organization_id: Uuid,

    /// Pre-tax amount in cents; must be non-negative.
    #[schema(example = 12_500)]
    pub subtotal_cents: i64,

    /// ISO 4217 code.
    #[serde(default = "default_currency")]
    #[schema(example = "SGD")]
    pub currency: String,

    /// Payment deadline; unset means no deadline.
    pub due_at: Option<DateTime<Utc>>,

    /// Identifier of the counterpart invoice at the payment provider.
    pub external_invoice_id: Option<String>,
}

fn default_currency() -> String {
    "SGD".to_string()
}

/// Body for `POST /billing/invoices/{id}/pay`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PayInvoiceRequest {
    /// Amount actually settled; defaults to the invoice total.
    #[serde(default)]
    pub amount_paid_cents: Option<i64>,
}

/// A stored invoice as returned by every billing endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Sequential number, `INV-YYYYMM-NNNN`.
    #[schema(example = "INV-202608-0001")]
    pub invoice_number: String,
    pub status: String,
    pub currency: String,
    pub subtotal_cents: i64,
    pub gst_amount_cents: i64,
    pub total_cents: i64,
    pub amount_paid_cents: i64,
    pub external_invoice_id: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            organization_id: invoice.organization_id,
            invoice_number: invoice.invoice_number,
            status: invoice.status,
            currency: invoice.currency,
            subtotal_cents: invoice.subtotal_cents,
            gst_amount_cents: invoice.gst_amount_cents,
            total_cents: invoice.total_cents,
            amount_paid_cents: invoice.amount_paid_cents,
            external_invoice_id: invoice.external_invoice_id,
            issued_at: invoice.issued_at,
            due_at: invoice.due_at,
            paid_at: invoice.paid_at,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults_currency() {
        let request: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "organization_id": "7f8532c9-4a77-4e28-a79b-33b77cbcd1bf",
            "subtotal_cents": 10_000,
        }))
        .unwrap();
        assert_eq!(request.currency, "SGD");
        assert!(request.due_at.is_none());
        assert!(request.external_invoice_id.is_none());
    }

    #[test]
    fn test_pay_request_accepts_empty_object() {
        let request: PayInvoiceRequest = serde_json::from_str("{}").unwrap();
        assert!(request.amount_paid_cents.is_none());
    }

    #[test]
    fn test_pay_request_reads_explicit_amount() {
        let request: PayInvoiceRequest =
            serde_json::from_value(serde_json::json!({"amount_paid_cents": 4_200})).unwrap();
        assert_eq!(request.amount_paid_cents, Some(4_200));
    }
}
