//! Data subject access request (DSAR) model.
//!
//! Lifecycle: `pending -> verifying -> processing -> completed | failed`.
//! Every transition verb is a conditional UPDATE keyed on the expected
//! current state, so a stale caller gets a typed error instead of
//! silently overwriting a concurrent transition. The deletion-approval
//! rule additionally lives in the table's CHECK constraint; the verbs
//! here are the polite path, the constraint is the wall.

use chrono::{DateTime, Duration, Utc};
use sentra_core::constants::{DSAR_SLA_HOURS, DSAR_SLA_WARNING_HOURS};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::error::DbError;

/// What the data subject asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsarRequestType {
    Export,
    Delete,
    Access,
    Rectification,
}

impl DsarRequestType {
    /// Deletion requests need an operator's explicit approval before
    /// the worker may execute them.
    #[must_use]
    pub fn requires_approval(self) -> bool {
        matches!(self, DsarRequestType::Delete)
    }
}

impl std::fmt::Display for DsarRequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DsarRequestType::Export => write!(f, "export"),
            DsarRequestType::Delete => write!(f, "delete"),
            DsarRequestType::Access => write!(f, "access"),
            DsarRequestType::Rectification => write!(f, "rectification"),
        }
    }
}

impl std::str::FromStr for DsarRequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "export" => Ok(DsarRequestType::Export),
            "delete" => Ok(DsarRequestType::Delete),
            "access" => Ok(DsarRequestType::Access),
            "rectification" => Ok(DsarRequestType::Rectification),
            _ => Err(format!("Invalid request type: {s}")),
        }
    }
}

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsarStatus {
    Pending,
    Verifying,
    Processing,
    Completed,
    Failed,
}

impl DsarStatus {
    /// Terminal states never transition again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, DsarStatus::Completed | DsarStatus::Failed)
    }
}

impl std::fmt::Display for DsarStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DsarStatus::Pending => write!(f, "pending"),
            DsarStatus::Verifying => write!(f, "verifying"),
            DsarStatus::Processing => write!(f, "processing"),
            DsarStatus::Completed => write!(f, "completed"),
            DsarStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DsarStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DsarStatus::Pending),
            "verifying" => Ok(DsarStatus::Verifying),
            "processing" => Ok(DsarStatus::Processing),
            "completed" => Ok(DsarStatus::Completed),
            "failed" => Ok(DsarStatus::Failed),
            _ => Err(format!("Invalid DSAR status: {s}")),
        }
    }
}

/// Where a request stands against the 72-hour resolution window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    Within,
    Approaching,
    Breached,
    Completed,
}

/// A data subject request in the database.
#[derive(Debug, Clone, FromRow)]
pub struct DsarRequest {
    /// Unique identifier.
    pub id: Uuid,
    /// Contact address of the data subject.
    pub email: String,
    /// Matched platform user, when one exists.
    pub user_id: Option<Uuid>,
    /// Request type.
    pub request_type: String,
    /// Lifecycle status.
    pub status: String,
    /// Free-text detail supplied by the subject.
    pub details: String,
    /// Token the subject must echo to prove mailbox ownership.
    pub verification_token: Uuid,
    /// When ownership was proven.
    pub verified_at: Option<DateTime<Utc>>,
    /// How ownership was proven (currently always "email").
    pub verification_method: Option<String>,
    /// Operator who approved a deletion.
    pub deletion_approved_by: Option<Uuid>,
    /// When the deletion was approved.
    pub deletion_approved_at: Option<DateTime<Utc>>,
    /// Download link for the export artifact.
    pub export_url: Option<String>,
    /// When the export link stops working.
    pub export_expires_at: Option<DateTime<Utc>>,
    /// Why the request failed, if it did.
    pub failure_reason: Option<String>,
    /// When the request was lodged. SLA age counts from here.
    pub created_at: DateTime<Utc>,
    /// When the request was resolved.
    pub processed_at: Option<DateTime<Utc>>,
}

/// Input for lodging a request.
#[derive(Debug, Clone)]
pub struct NewDsarRequest {
    pub email: String,
    pub user_id: Option<Uuid>,
    pub request_type: DsarRequestType,
    pub details: String,
}

/// Dashboard aggregation over non-terminal requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
pub struct SlaCounts {
    pub within_sla: i64,
    pub approaching_sla: i64,
    pub breached_sla: i64,
    pub pending_approval: i64,
}

impl DsarRequest {
    /// Get the request type as enum.
    #[must_use]
    pub fn request_type_enum(&self) -> Option<DsarRequestType> {
        self.request_type.parse().ok()
    }

    /// Get the status as enum.
    #[must_use]
    pub fn status_enum(&self) -> Option<DsarStatus> {
        self.status.parse().ok()
    }

    /// Whether the data subject has proven mailbox ownership.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }

    /// Whether a deletion operator has signed off.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.deletion_approved_by.is_some()
    }

    /// Derive the SLA bucket as of `at`.
    ///
    /// Pure function of `status` and `created_at`; nothing is stored.
    /// Completed requests report `Completed` regardless of how long
    /// they took.
    #[must_use]
    pub fn sla_status(&self, at: DateTime<Utc>) -> SlaStatus {
        if self.status_enum() == Some(DsarStatus::Completed) {
            return SlaStatus::Completed;
        }
        let age = at - self.created_at;
        if age >= Duration::hours(DSAR_SLA_HOURS) {
            SlaStatus::Breached
        } else if age >= Duration::hours(DSAR_SLA_WARNING_HOURS) {
            SlaStatus::Approaching
        } else {
            SlaStatus::Within
        }
    }

    /// Lodge a new request. The verification token is generated by the
    /// database and returned on the row.
    pub async fn create<'e, E>(executor: E, input: &NewDsarRequest) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO dsar_requests (email, user_id, request_type, details)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, user_id, request_type, status, details, verification_token,
                      verified_at, verification_method, deletion_approved_by,
                      deletion_approved_at, export_url, export_expires_at, failure_reason,
                      created_at, processed_at
            ",
        )
        .bind(&input.email)
        .bind(input.user_id)
        .bind(input.request_type.to_string())
        .bind(&input.details)
        .fetch_one(executor)
        .await
    }

    /// Fetch a request by id.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, email, user_id, request_type, status, details, verification_token,
                   verified_at, verification_method, deletion_approved_by,
                   deletion_approved_at, export_url, export_expires_at, failure_reason,
                   created_at, processed_at
            FROM dsar_requests
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// `pending -> verifying` after the subject echoed their token.
    pub async fn verify<'e, E>(executor: E, id: Uuid, now: DateTime<Utc>) -> Result<Self, DbError>
    where
        E: PgExecutor<'e>,
    {
        let updated = sqlx::query_as::<_, Self>(
            r"
            UPDATE dsar_requests
            SET status = 'verifying', verified_at = $2, verification_method = 'email'
            WHERE id = $1 AND status = 'pending'
            RETURNING id, email, user_id, request_type, status, details, verification_token,
                      verified_at, verification_method, deletion_approved_by,
                      deletion_approved_at, export_url, export_expires_at, failure_reason,
                      created_at, processed_at
            ",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(executor)
        .await?;

        updated.ok_or_else(|| DbError::StaleTransition(format!("dsar {id} is not pending")))
    }

    /// Record an operator's deletion sign-off.
    ///
    /// Only verified, unapproved delete requests accept it.
    pub async fn approve_deletion<'e, E>(
        executor: E,
        id: Uuid,
        approver_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Self, DbError>
    where
        E: PgExecutor<'e>,
    {
        let updated = sqlx::query_as::<_, Self>(
            r"
            UPDATE dsar_requests
            SET deletion_approved_by = $2, deletion_approved_at = $3
            WHERE id = $1 AND request_type = 'delete' AND status = 'verifying'
              AND deletion_approved_by IS NULL
            RETURNING id, email, user_id, request_type, status, details, verification_token,
                      verified_at, verification_method, deletion_approved_by,
                      deletion_approved_at, export_url, export_expires_at, failure_reason,
                      created_at, processed_at
            ",
        )
        .bind(id)
        .bind(approver_id)
        .bind(now)
        .fetch_optional(executor)
        .await?;

        updated.ok_or_else(|| {
            DbError::StaleTransition(format!("dsar {id} is not awaiting deletion approval"))
        })
    }

    /// `verifying -> processing`; the worker takes it from here.
    pub async fn start_processing<'e, E>(executor: E, id: Uuid) -> Result<Self, DbError>
    where
        E: PgExecutor<'e>,
    {
        let updated = sqlx::query_as::<_, Self>(
            r"
            UPDATE dsar_requests
            SET status = 'processing'
            WHERE id = $1 AND status = 'verifying'
            RETURNING id, email, user_id, request_type, status, details, verification_token,
                      verified_at, verification_method, deletion_approved_by,
                      deletion_approved_at, export_url, export_expires_at, failure_reason,
                      created_at, processed_at
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        updated.ok_or_else(|| DbError::StaleTransition(format!("dsar {id} is not verifying")))
    }

    /// `processing -> completed`, stamping the resolution time and any
    /// export artifact link.
    ///
    /// For delete requests without a recorded approver this violates the
    /// table's CHECK constraint and the transaction fails; the worker
    /// fails such requests instead of completing them.
    pub async fn complete<'e, E>(
        executor: E,
        id: Uuid,
        export_url: Option<&str>,
        export_expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, DbError>
    where
        E: PgExecutor<'e>,
    {
        let updated = sqlx::query_as::<_, Self>(
            r"
            UPDATE dsar_requests
            SET status = 'completed', processed_at = $2, export_url = $3,
                export_expires_at = $4
            WHERE id = $1 AND status = 'processing'
            RETURNING id, email, user_id, request_type, status, details, verification_token,
                      verified_at, verification_method, deletion_approved_by,
                      deletion_approved_at, export_url, export_expires_at, failure_reason,
                      created_at, processed_at
            ",
        )
        .bind(id)
        .bind(now)
        .bind(export_url)
        .bind(export_expires_at)
        .fetch_optional(executor)
        .await?;

        updated.ok_or_else(|| DbError::StaleTransition(format!("dsar {id} is not processing")))
    }

    /// `processing -> failed` with a recorded reason.
    pub async fn fail<'e, E>(executor: E, id: Uuid, reason: &str) -> Result<Self, DbError>
    where
        E: PgExecutor<'e>,
    {
        let updated = sqlx::query_as::<_, Self>(
            r"
            UPDATE dsar_requests
            SET status = 'failed', failure_reason = $2
            WHERE id = $1 AND status = 'processing'
            RETURNING id, email, user_id, request_type, status, details, verification_token,
                      verified_at, verification_method, deletion_approved_by,
                      deletion_approved_at, export_url, export_expires_at, failure_reason,
                      created_at, processed_at
            ",
        )
        .bind(id)
        .bind(reason)
        .fetch_optional(executor)
        .await?;

        updated.ok_or_else(|| DbError::StaleTransition(format!("dsar {id} is not processing")))
    }

    /// Claim requests in `processing` for the worker.
    ///
    /// Must run inside a transaction: the row locks hold until commit,
    /// and the resolution verbs run on the same transaction, so a
    /// request is resolved by at most one worker pass.
    pub async fn claim_processing_batch<'e, E>(
        executor: E,
        limit: i32,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, email, user_id, request_type, status, details, verification_token,
                   verified_at, verification_method, deletion_approved_by,
                   deletion_approved_at, export_url, export_expires_at, failure_reason,
                   created_at, processed_at
            FROM dsar_requests
            WHERE status = 'processing'
            ORDER BY created_at
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            ",
        )
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    /// Dashboard counts over non-terminal requests.
    pub async fn sla_counts<'e, E>(executor: E, now: DateTime<Utc>) -> Result<SlaCounts, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let approaching_cutoff = now - Duration::hours(DSAR_SLA_WARNING_HOURS);
        let breach_cutoff = now - Duration::hours(DSAR_SLA_HOURS);
        sqlx::query_as::<_, SlaCounts>(
            r"
            SELECT
                COUNT(*) FILTER (WHERE created_at > $1) AS within_sla,
                COUNT(*) FILTER (WHERE created_at <= $1 AND created_at > $2) AS approaching_sla,
                COUNT(*) FILTER (WHERE created_at <= $2) AS breached_sla,
                COUNT(*) FILTER (WHERE request_type = 'delete'
                                   AND verified_at IS NOT NULL
                                   AND deletion_approved_by IS NULL) AS pending_approval
            FROM dsar_requests
            WHERE status NOT IN ('completed', 'failed')
            ",
        )
        .bind(approaching_cutoff)
        .bind(breach_cutoff)
        .fetch_one(executor)
        .await
    }

    /// Null out expired export links. Returns the affected request ids.
    pub async fn expire_export_links<'e, E>(
        executor: E,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, (Uuid,)>(
            r"
            UPDATE dsar_requests
            SET export_url = NULL
            WHERE export_url IS NOT NULL AND export_expires_at <= $1
            RETURNING id
            ",
        )
        .bind(now)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
