//! Data subject request (DSAR) lifecycle.
//!
//! Public endpoints lodge and verify requests; admin endpoints approve
//! deletions and watch the 72-hour SLA. Verified non-delete requests
//! enter the worker's queue immediately, deletions only after an
//! operator's explicit sign-off.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;

pub use error::{ApiResult, ErrorResponse, PrivacyError};
pub use models::{
    ApproveDeleteRequest, CreateDsarRequest, DsarResponse, SlaDashboardResponse, VerifyDsarRequest,
};
pub use router::{admin_router, public_router, PrivacyState};
