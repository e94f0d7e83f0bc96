//! Sentra Core Library
//!
//! Shared types and platform constants for sentra.
//!
//! # Modules
//!
//! - [`constants`] - Platform-wide numbers and header names
//! - [`money`] - Integer-cent invoice arithmetic (GST, totals)
//! - [`notify`] - Email notification trait and implementations
//!
//! # Example
//!
//! ```
//! use sentra_core::money::InvoiceTotals;
//! use sentra_core::constants::GST_RATE_BASIS_POINTS;
//!
//! let totals = InvoiceTotals::compute(10_000, GST_RATE_BASIS_POINTS);
//! assert_eq!(totals.gst_amount_cents, 900);
//! assert_eq!(totals.total_cents, 10_900);
//! ```

pub mod constants;
pub mod money;
pub mod notify;

// Re-export main types for convenient access
pub use money::InvoiceTotals;
pub use notify::{EmailSender, LogEmailSender, MockEmailSender};
