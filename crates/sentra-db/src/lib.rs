//! Sentra Database Library
//!
//! PostgreSQL access for sentra: pool construction, embedded migrations,
//! and one model module per table.
//!
//! Model functions are generic over [`sqlx::PgExecutor`] so callers can
//! pass either the pool (single-statement operations) or an open
//! transaction (multi-statement invariants such as "state change and
//! audit event commit together").
//!
//! The safety-critical invariants live in the schema itself as UNIQUE
//! and CHECK constraints; the model functions are written so that racing
//! callers are decided by the database, not by application locks.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::DbPool;
