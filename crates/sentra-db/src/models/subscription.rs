//! Subscription model.
//!
//! Subscriptions exist here as mutation targets for provider events;
//! plan management happens in the provider's dashboard. Event handlers
//! update by the provider's subscription id and treat a missing local
//! row as a logged no-op, never a failure.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Subscription lifecycle status, mirroring the provider's states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Incomplete,
    Active,
    PastDue,
    Canceled,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Incomplete => write!(f, "incomplete"),
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::PastDue => write!(f, "past_due"),
            SubscriptionStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            _ => Err(format!("Invalid subscription status: {s}")),
        }
    }
}

/// A subscription in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Subscription {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning organization.
    pub organization_id: Uuid,
    /// Payment provider's subscription id.
    pub external_subscription_id: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// End of the currently paid-for period.
    pub current_period_end: Option<DateTime<Utc>>,
    /// When the subscription was canceled.
    pub canceled_at: Option<DateTime<Utc>>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Get the status as enum.
    #[must_use]
    pub fn status_enum(&self) -> Option<SubscriptionStatus> {
        self.status.parse().ok()
    }

    /// Fetch by the provider's subscription id.
    pub async fn find_by_external_id<'e, E>(
        executor: E,
        external_id: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, organization_id, external_subscription_id, status,
                   current_period_end, canceled_at, created_at, updated_at
            FROM subscriptions
            WHERE external_subscription_id = $1
            ",
        )
        .bind(external_id)
        .fetch_optional(executor)
        .await
    }

    /// Apply a provider status/period update. Returns affected rows;
    /// zero means no local subscription carries that id.
    pub async fn update_from_event<'e, E>(
        executor: E,
        external_id: &str,
        status: SubscriptionStatus,
        current_period_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE subscriptions
            SET status = $2, current_period_end = COALESCE($3, current_period_end),
                updated_at = $4
            WHERE external_subscription_id = $1
            ",
        )
        .bind(external_id)
        .bind(status.to_string())
        .bind(current_period_end)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark a subscription canceled. Idempotent: the first cancellation
    /// time sticks.
    pub async fn cancel_by_external_id<'e, E>(
        executor: E,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE subscriptions
            SET status = 'canceled', canceled_at = COALESCE(canceled_at, $2), updated_at = $2
            WHERE external_subscription_id = $1
            ",
        )
        .bind(external_id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
