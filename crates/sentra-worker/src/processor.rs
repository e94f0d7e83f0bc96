//! Per-event reconciliation.
//!
//! One call of [`process_event`] is one attempt at one claimed event.
//! The effect, its audit record, and the processed flag commit in a
//! single transaction; a failure anywhere rolls all of it back and
//! books the attempt against the retry budget instead.

use chrono::{DateTime, Duration, Utc};
use sentra_db::models::WebhookEvent;
use sentra_db::DbError;
use sentra_webhooks::event::{EventParseError, PaymentEvent};
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};

use crate::handlers;

/// Result of one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Terminal success; the event will never run again.
    Processed,
    /// Attempt failed, another is scheduled after `delay`.
    Retry { delay: Duration },
    /// Attempt failed with the retry budget spent; the event is parked
    /// until an administrator resets it.
    GivenUp,
}

#[derive(Debug, thiserror::Error)]
enum ApplyError {
    #[error(transparent)]
    Parse(#[from] EventParseError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Backoff before the next attempt after `failed_attempts` failures.
///
/// 60 s base, doubling per failure: 60, 120, 240, ...
#[must_use]
pub fn retry_delay(failed_attempts: i32) -> Duration {
    let exponent = failed_attempts.clamp(0, 24);
    Duration::seconds(60_i64 << exponent)
}

/// Decide what a failure at `failed_attempts` prior failures leads to:
/// `Some(delay)` schedules a retry, `None` parks the event.
#[must_use]
pub fn schedule_after_failure(failed_attempts: i32, max_retries: i32) -> Option<Duration> {
    if failed_attempts >= max_retries {
        None
    } else {
        Some(retry_delay(failed_attempts))
    }
}

/// Run one attempt for a claimed event.
#[instrument(
    skip(pool, event),
    fields(id = %event.id, service = %event.service, event_type = %event.event_type)
)]
pub async fn process_event(
    pool: &PgPool,
    event: &WebhookEvent,
    max_retries: i32,
    now: DateTime<Utc>,
) -> Outcome {
    match apply(pool, event, now).await {
        Ok(()) => {
            info!("Webhook event processed");
            Outcome::Processed
        }
        Err(e) => record_failure(pool, event, &e.to_string(), max_retries, now).await,
    }
}

async fn apply(pool: &PgPool, event: &WebhookEvent, now: DateTime<Utc>) -> Result<(), ApplyError> {
    let payment_event = PaymentEvent::classify(&event.event_type, &event.payload)?;

    let mut tx = pool.begin().await?;
    match &payment_event {
        PaymentEvent::Unknown { event_type } => {
            info!(
                unknown_type = %event_type,
                "No handler for event type, acknowledging as no-op"
            );
        }
        known => handlers::apply(&mut tx, known, now).await?,
    }
    WebhookEvent::mark_processed(&mut *tx, event.id, now).await?;
    tx.commit().await?;
    Ok(())
}

async fn record_failure(
    pool: &PgPool,
    event: &WebhookEvent,
    handler_error: &str,
    max_retries: i32,
    now: DateTime<Utc>,
) -> Outcome {
    // retry_count on the claimed row is the number of failures before
    // this attempt.
    let failed_attempts = event.retry_count;

    match schedule_after_failure(failed_attempts, max_retries) {
        Some(delay) => {
            if let Err(e) =
                WebhookEvent::mark_failed(pool, event.id, handler_error, now, Some(now + delay))
                    .await
            {
                // The claim lease resurfaces the event without spending
                // budget if this bookkeeping write is lost.
                error!(error = %e, "Failed to record webhook attempt failure");
            }
            warn!(
                error = %handler_error,
                attempt = failed_attempts + 1,
                retry_in_secs = delay.num_seconds(),
                "Webhook handler failed, retry scheduled"
            );
            Outcome::Retry { delay }
        }
        None => {
            if let Err(e) =
                WebhookEvent::mark_failed(pool, event.id, handler_error, now, None).await
            {
                error!(error = %e, "Failed to record webhook attempt failure");
            }
            warn!(
                error = %handler_error,
                attempts = failed_attempts + 1,
                "Webhook event given up, awaiting manual retry"
            );
            Outcome::GivenUp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_from_sixty_seconds() {
        assert_eq!(retry_delay(0), Duration::seconds(60));
        assert_eq!(retry_delay(1), Duration::seconds(120));
        assert_eq!(retry_delay(2), Duration::seconds(240));
    }

    #[test]
    fn test_retry_delay_clamps_large_counts() {
        // Never overflows even for absurd stored counts.
        assert_eq!(retry_delay(1000), retry_delay(24));
    }

    #[test]
    fn test_budget_allows_three_retries_after_initial_attempt() {
        assert_eq!(schedule_after_failure(0, 3), Some(Duration::seconds(60)));
        assert_eq!(schedule_after_failure(1, 3), Some(Duration::seconds(120)));
        assert_eq!(schedule_after_failure(2, 3), Some(Duration::seconds(240)));
        assert_eq!(schedule_after_failure(3, 3), None);
    }

    #[test]
    fn test_zero_budget_parks_immediately() {
        assert_eq!(schedule_after_failure(0, 0), None);
    }
}
