//! Database models, one module per table.

pub mod audit_event;
pub mod dsar_request;
pub mod idempotency_record;
pub mod invoice;
pub mod subscription;
pub mod webhook_event;

pub use audit_event::{AuditEvent, RecordAuditEvent};
pub use dsar_request::{DsarRequest, DsarRequestType, DsarStatus, NewDsarRequest, SlaCounts, SlaStatus};
pub use idempotency_record::{IdempotencyRecord, IdempotencyStatus, NewIdempotencyRecord};
pub use invoice::{Invoice, InvoiceStatus, NewInvoice};
pub use subscription::{Subscription, SubscriptionStatus};
pub use webhook_event::{NewWebhookEvent, WebhookEvent, WebhookEventFilter};
