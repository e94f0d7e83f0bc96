//! Email notification seam.
//!
//! The privacy flow sends two kinds of mail: a verification link when a
//! data subject request is created, and a completion notice (with the
//! export link, when one exists) when the request resolves. The trait
//! keeps delivery pluggable; the default wiring uses [`LogEmailSender`]
//! so environments without an SMTP relay still surface every send in the
//! structured logs.

use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

/// Errors surfaced by an email delivery backend.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Outbound email delivery for the privacy flow.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send the verify-your-request email for a new data subject request.
    async fn send_dsar_verification(
        &self,
        email: &str,
        request_id: Uuid,
        verification_token: Uuid,
    ) -> Result<(), NotifyError>;

    /// Notify the data subject that their request was resolved.
    ///
    /// `export_url` is present for export-style requests and carries an
    /// expiring artifact link.
    async fn send_dsar_completion(
        &self,
        email: &str,
        request_id: Uuid,
        export_url: Option<&str>,
    ) -> Result<(), NotifyError>;
}

/// Delivery backend that writes sends to the log instead of a relay.
#[derive(Debug, Default, Clone)]
pub struct LogEmailSender;

impl LogEmailSender {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_dsar_verification(
        &self,
        email: &str,
        request_id: Uuid,
        verification_token: Uuid,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            target: "notify",
            to = %email,
            request_id = %request_id,
            token = %verification_token,
            "dsar verification email"
        );
        Ok(())
    }

    async fn send_dsar_completion(
        &self,
        email: &str,
        request_id: Uuid,
        export_url: Option<&str>,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            target: "notify",
            to = %email,
            request_id = %request_id,
            export_url = export_url.unwrap_or("-"),
            "dsar completion email"
        );
        Ok(())
    }
}

/// What a captured mock send contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentEmail {
    Verification {
        to: String,
        request_id: Uuid,
        token: Uuid,
    },
    Completion {
        to: String,
        request_id: Uuid,
        export_url: Option<String>,
    },
}

/// Capturing sender for tests.
#[derive(Debug, Default)]
pub struct MockEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl MockEmailSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send_dsar_verification(
        &self,
        email: &str,
        request_id: Uuid,
        verification_token: Uuid,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(SentEmail::Verification {
            to: email.to_string(),
            request_id,
            token: verification_token,
        });
        Ok(())
    }

    async fn send_dsar_completion(
        &self,
        email: &str,
        request_id: Uuid,
        export_url: Option<&str>,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(SentEmail::Completion {
            to: email.to_string(),
            request_id,
            export_url: export_url.map(str::to_string),
        });
        Ok(())
    }
}
