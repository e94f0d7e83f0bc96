pub mod idempotency;

pub use idempotency::{request_hash, validate_key, GuardOutcome, IdempotencyGuard};
