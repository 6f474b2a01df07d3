//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! The database URL is wrapped in `secrecy::SecretString` so it never
//! ends up in logs.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::worker::WorkerConfig;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    /// Queues to work, highest priority first.
    pub queues: Vec<String>,
    pub poll_interval: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let queues = match std::env::var("RESTRICTQ_QUEUES") {
            Ok(raw) => parse_queues(&raw)?,
            Err(_) => vec!["default".to_string()],
        };

        let poll_interval = match std::env::var("RESTRICTQ_POLL_INTERVAL_MS") {
            Ok(raw) => Duration::from_millis(raw.trim().parse().map_err(|_| {
                Error::Config(format!("RESTRICTQ_POLL_INTERVAL_MS is not a number: {raw}"))
            })?),
            Err(_) => Duration::from_secs(5),
        };

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            queues,
            poll_interval,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Worker settings derived from this config.
    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            queues: self.queues.clone(),
            poll_interval: self.poll_interval,
        }
    }
}

/// Split a comma-separated queue list, dropping blanks.
pub fn parse_queues(raw: &str) -> Result<Vec<String>> {
    let queues: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect();
    if queues.is_empty() {
        return Err(Error::Config("no queues configured".to_string()));
    }
    Ok(queues)
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}
