//! Application configuration loaded from environment variables.
//!
//! This module provides fail-fast configuration loading with validation.
//! Required variables must be present and valid, or the application will
//! exit with a clear error message.
//!
//! Includes production environment detection: insecure defaults are
//! tolerated with warnings in development and refused outright in
//! production.

use std::collections::HashMap;
use std::env;

use sentra_worker::WorkerConfig;
use thiserror::Error;

/// Default `ADMIN_TOKEN` for local development.
pub const INSECURE_ADMIN_TOKEN: &str = "sentra-dev-admin-token-change-in-production";

/// Application environment mode.
///
/// Controls security enforcement behavior:
/// - `Development`: Insecure defaults are allowed with WARN-level logging.
/// - `Production`: Insecure defaults cause the application to refuse startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    /// Parse from the `APP_ENV` environment variable value.
    /// Defaults to `Development` if unset or unrecognized.
    pub fn from_env_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => {
                tracing::warn!(
                    value = other,
                    "Unrecognized APP_ENV value, defaulting to Development"
                );
                Self::Development
            }
        }
    }

    /// Returns true if this is production mode.
    #[must_use]
    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Failed to parse port: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application environment (development or production).
    pub app_env: AppEnvironment,

    /// PostgreSQL connection string.
    pub database_url: String,

    /// Bind address.
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Log level filter passed to the tracing subscriber.
    pub rust_log: String,

    /// Allowed CORS origins. `["*"]` means any origin.
    pub cors_origins: Vec<String>,

    /// Shared secret gating the admin surface.
    pub admin_token: String,

    /// Webhook signing secrets keyed by lowercase service name.
    /// `WEBHOOK_SECRET_PAYMENTS` configures the `payments` service.
    pub webhook_secrets: HashMap<String, String>,

    /// Base URL stamped onto finished export download links.
    pub export_base_url: String,

    /// Background worker tuning.
    pub worker: WorkerConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required variables are missing
    /// - Values are invalid (e.g., invalid port number)
    ///
    /// # Required Variables
    ///
    /// - `DATABASE_URL` - PostgreSQL connection string
    ///
    /// # Optional Variables
    ///
    /// - `APP_ENV` - "development" or "production" (default: "development")
    /// - `RUST_LOG` - Log level filter (default: "info")
    /// - `CORS_ORIGINS` - Comma-separated allowed origins (default: "*")
    /// - `HOST` - Bind address (default: "0.0.0.0")
    /// - `PORT` - Listen port (default: 8080)
    /// - `ADMIN_TOKEN` - Admin surface secret (default: insecure dev token)
    /// - `WEBHOOK_SECRET_<SERVICE>` - Per-service webhook signing secrets
    /// - `EXPORT_BASE_URL` - Base URL for export download links
    /// - `WORKER_*` - Worker tuning knobs (see `WorkerConfig`)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development only)
        let _ = dotenvy::dotenv();

        let app_env = AppEnvironment::from_env_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        // Required variables
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        // Optional variables with defaults
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        if port == 0 {
            return Err(ConfigError::InvalidValue {
                var: "PORT".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }

        let admin_token =
            env::var("ADMIN_TOKEN").unwrap_or_else(|_| INSECURE_ADMIN_TOKEN.to_string());

        let webhook_secrets = webhook_secrets_from_vars(env::vars());

        let export_base_url = env::var("EXPORT_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080/exports/dsar".to_string());

        let worker = worker_config_from_env()?;

        Ok(Self {
            app_env,
            database_url,
            host,
            port,
            rust_log,
            cors_origins,
            admin_token,
            webhook_secrets,
            export_base_url,
            worker,
        })
    }

    /// Socket address string for the HTTP listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate security-sensitive configuration against insecure defaults.
    ///
    /// Returns `Ok(warnings)` when startup may proceed (development mode
    /// logs each issue at WARN level) and `Err(errors)` when the
    /// configuration must be refused (production mode with any issue).
    pub fn validate_security_config(&self) -> Result<Vec<String>, Vec<String>> {
        let mut issues = Vec::new();

        if self.admin_token == INSECURE_ADMIN_TOKEN {
            issues.push("ADMIN_TOKEN is using the default insecure value".to_string());
        } else if self.admin_token.len() < 16 {
            issues.push("ADMIN_TOKEN is shorter than 16 characters".to_string());
        }

        if self.cors_origins.iter().any(|o| o == "*") {
            issues.push("CORS_ORIGINS allows any origin (*)".to_string());
        }

        if self.app_env.is_production() && !issues.is_empty() {
            Err(issues)
        } else {
            Ok(issues)
        }
    }
}

/// Collect `WEBHOOK_SECRET_<SERVICE>` variables into a service-to-secret
/// map. The service name is lowercased; empty names and values are skipped.
fn webhook_secrets_from_vars(
    vars: impl Iterator<Item = (String, String)>,
) -> HashMap<String, String> {
    vars.filter_map(|(key, value)| {
        let service = key.strip_prefix("WEBHOOK_SECRET_")?;
        if service.is_empty() || value.is_empty() {
            return None;
        }
        Some((service.to_lowercase(), value))
    })
    .collect()
}

/// Build the worker configuration: defaults overridden by `WORKER_*`
/// environment variables where present.
fn worker_config_from_env() -> Result<WorkerConfig, ConfigError> {
    let defaults = WorkerConfig::default();
    Ok(WorkerConfig {
        concurrency: env_parse("WORKER_CONCURRENCY", defaults.concurrency)?,
        event_poll_interval_ms: env_parse(
            "WORKER_EVENT_POLL_INTERVAL_MS",
            defaults.event_poll_interval_ms,
        )?,
        event_batch_size: env_parse("WORKER_EVENT_BATCH_SIZE", defaults.event_batch_size)?,
        max_retries: env_parse("WORKER_MAX_RETRIES", defaults.max_retries)?,
        claim_lease_secs: env_parse("WORKER_CLAIM_LEASE_SECS", defaults.claim_lease_secs)?,
        dsar_poll_interval_secs: env_parse(
            "WORKER_DSAR_POLL_INTERVAL_SECS",
            defaults.dsar_poll_interval_secs,
        )?,
        dsar_batch_size: env_parse("WORKER_DSAR_BATCH_SIZE", defaults.dsar_batch_size)?,
        sweep_interval_secs: env_parse("WORKER_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
        webhook_retention_days: env_parse(
            "WORKER_WEBHOOK_RETENTION_DAYS",
            defaults.webhook_retention_days,
        )?,
    })
}

/// Parse an optional environment variable, falling back to a default.
fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: var.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
