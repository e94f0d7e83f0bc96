//! Webhook business logic services.

pub mod ingress;

pub use ingress::IngressService;
