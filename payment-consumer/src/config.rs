//! Configuration loaded from environment variables with sensible defaults.

use std::env;

/// Payment consumer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// AMQP broker URL. Required; the consumer is nothing without it.
    pub rabbitmq_url: String,
    /// Exchange all services publish through.
    pub exchange: String,
    /// Payment provider base URL.
    pub payment_provider_url: String,
    /// Payment provider API key.
    pub secret_key: String,
    /// Worker count.
    pub num_workers: usize,
    /// Channel prefetch (un-acked delivery cap).
    pub prefetch_count: u16,
    /// Per-call payment timeout, seconds.
    pub payment_timeout_secs: u64,
}

/// A required environment variable is missing.
#[derive(Debug, thiserror::Error)]
#[error("missing required environment variable {0}")]
pub struct MissingEnv(pub &'static str);

impl Config {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEnv`] when `RABBITMQ_URL` or `SECRET_KEY` is unset.
    pub fn from_env() -> Result<Self, MissingEnv> {
        Ok(Self {
            rabbitmq_url: env::var("RABBITMQ_URL").map_err(|_| MissingEnv("RABBITMQ_URL"))?,
            exchange: env::var("BROKER_EXCHANGE").unwrap_or_else(|_| "tixie".to_string()),
            payment_provider_url: env::var("PAYMENT_PROVIDER_URL")
                .unwrap_or_else(|_| "http://localhost:8088".to_string()),
            secret_key: env::var("SECRET_KEY").map_err(|_| MissingEnv("SECRET_KEY"))?,
            num_workers: env::var("NUM_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            prefetch_count: env::var("PREFETCH_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            payment_timeout_secs: env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        })
    }
}
