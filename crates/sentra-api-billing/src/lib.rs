//! Idempotent billing mutations.
//!
//! Invoice create, pay, and void endpoints, each gated on a
//! client-supplied `Idempotency-Key`. A completed key replays the
//! recorded response verbatim for 24 hours, including business
//! rejections; GST and totals are computed server-side from the
//! subtotal at write time.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::{ApiResult, BillingError, ErrorResponse};
pub use models::{CreateInvoiceRequest, InvoiceResponse, PayInvoiceRequest};
pub use router::{billing_router, BillingState};
pub use services::{GuardOutcome, IdempotencyGuard};
