//! Reconciliation worker.
//!
//! One long-running loop drives three cadences: claiming and processing
//! due webhook events, resolving data subject requests, and the
//! maintenance sweeps. Shutdown is graceful, in-flight events finish
//! before `run` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sentra_core::constants::{WEBHOOK_MAX_RETRIES, WEBHOOK_RETENTION_DAYS};
use sentra_core::notify::EmailSender;
use sentra_db::models::WebhookEvent;
use sqlx::PgPool;
use tokio::sync::Semaphore;
use tokio::time::interval;
use tracing::{debug, error, info, instrument};

use crate::{dsar_jobs, processor, sweeps};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of events processed concurrently.
    pub concurrency: usize,

    /// How often to poll for due webhook events (in milliseconds).
    pub event_poll_interval_ms: u64,

    /// Maximum events claimed per poll.
    pub event_batch_size: i32,

    /// Retry budget per event after its initial attempt.
    pub max_retries: i32,

    /// How long a claimed event stays invisible to other pollers (in
    /// seconds). Also the crash-recovery bound: an attempt that dies
    /// without recording a result resurfaces after this long.
    pub claim_lease_secs: i64,

    /// How often to resolve data subject requests (in seconds).
    pub dsar_poll_interval_secs: u64,

    /// Maximum data subject requests resolved per pass.
    pub dsar_batch_size: i32,

    /// How often to run the maintenance sweeps (in seconds).
    pub sweep_interval_secs: u64,

    /// Retention period for processed webhook events (in days).
    pub webhook_retention_days: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            event_poll_interval_ms: 1000,
            event_batch_size: 10,
            max_retries: WEBHOOK_MAX_RETRIES,
            claim_lease_secs: 60,
            dsar_poll_interval_secs: 5,
            dsar_batch_size: 10,
            sweep_interval_secs: 3600,
            webhook_retention_days: WEBHOOK_RETENTION_DAYS,
        }
    }
}

/// Background worker that reconciles external events and resolves data
/// subject requests.
pub struct ReconcileWorker {
    pool: PgPool,
    email_sender: Arc<dyn EmailSender>,
    export_base_url: String,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl ReconcileWorker {
    /// Create a new worker.
    pub fn new(
        pool: PgPool,
        email_sender: Arc<dyn EmailSender>,
        export_base_url: String,
        config: WorkerConfig,
    ) -> Self {
        Self {
            pool,
            email_sender,
            export_base_url,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the worker.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!(
            concurrency = self.config.concurrency,
            event_poll_interval_ms = self.config.event_poll_interval_ms,
            dsar_poll_interval_secs = self.config.dsar_poll_interval_secs,
            "Starting reconciliation worker"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut poll_interval =
            interval(Duration::from_millis(self.config.event_poll_interval_ms));
        let mut dsar_interval =
            interval(Duration::from_secs(self.config.dsar_poll_interval_secs));
        let mut sweep_interval = interval(Duration::from_secs(self.config.sweep_interval_secs));

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        info!("Worker shutdown requested, stopping poll loop");
                        break;
                    }
                    self.poll_and_process(&semaphore).await;
                }
                _ = dsar_interval.tick() => {
                    self.run_dsar_jobs().await;
                }
                _ = sweep_interval.tick() => {
                    sweeps::run_all(
                        &self.pool,
                        self.config.webhook_retention_days,
                        Utc::now(),
                    )
                    .await;
                }
            }
        }

        // Wait for in-flight events to complete
        info!("Waiting for in-flight events to complete...");
        let _ = semaphore.acquire_many(self.config.concurrency as u32).await;
        info!("Worker stopped");
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Check if shutdown was requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Claim due events and process them on the semaphore.
    async fn poll_and_process(&self, semaphore: &Arc<Semaphore>) {
        let events = match WebhookEvent::claim_due_batch(
            &self.pool,
            Utc::now(),
            self.config.max_retries,
            self.config.claim_lease_secs,
            self.config.event_batch_size,
        )
        .await
        {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "Failed to claim due webhook events");
                return;
            }
        };

        if events.is_empty() {
            return;
        }

        debug!(count = events.len(), "Claimed webhook events for processing");

        for event in events {
            let permit = if let Ok(p) = semaphore.clone().try_acquire_owned() {
                p
            } else {
                // Claimed but unstarted events resurface when their
                // lease runs out, without spending retry budget.
                debug!("All worker slots busy, skipping remaining events");
                return;
            };

            let pool = self.pool.clone();
            let max_retries = self.config.max_retries;

            tokio::spawn(async move {
                let _permit = permit; // Hold permit until task completes
                processor::process_event(&pool, &event, max_retries, Utc::now()).await;
            });
        }
    }

    /// Resolve one batch of data subject requests.
    async fn run_dsar_jobs(&self) {
        match dsar_jobs::run_dsar_pass(
            &self.pool,
            self.email_sender.as_ref(),
            &self.export_base_url,
            self.config.dsar_batch_size,
            Utc::now(),
        )
        .await
        {
            Ok(count) if count > 0 => {
                info!(count, "Resolved data subject requests");
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Failed to resolve data subject requests");
            }
        }
    }
}
