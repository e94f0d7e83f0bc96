//! Signed webhook ingress for external payment service events.
//!
//! Verifies HMAC-SHA256 payload signatures, deduplicates deliveries on
//! (service, event id), and persists accepted events for asynchronous
//! reconciliation. Also exposes the admin surface for inspecting and
//! manually retrying stored events.

pub mod crypto;
pub mod error;
pub mod event;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::IngressError;
pub use event::{EventEnvelope, EventParseError, PaymentEvent};
pub use models::IngressAck;
pub use router::{admin_router, ingress_router, WebhooksState};
pub use services::IngressService;
