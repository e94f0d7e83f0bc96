//! HTTP handlers for webhook endpoints.

pub mod admin;
pub mod ingress;
