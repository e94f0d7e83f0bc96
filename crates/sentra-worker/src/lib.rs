//! # Reconciliation Worker
//!
//! Background processing for the platform: webhook event reconciliation
//! with retry and backoff, data subject request resolution, and the
//! periodic maintenance sweeps.
//!
//! Events arrive through the ingress crate and are persisted before
//! acknowledgement; this crate claims due events with a lease, applies
//! each one inside a single transaction (effect, audit record, processed
//! flag together), and books failures against a bounded retry budget.

pub mod dsar_jobs;
pub mod handlers;
pub mod processor;
pub mod sweeps;
pub mod worker;

pub use dsar_jobs::run_dsar_pass;
pub use processor::{process_event, retry_delay, schedule_after_failure, Outcome};
pub use worker::{ReconcileWorker, WorkerConfig};
