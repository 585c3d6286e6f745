//! Configuration loaded from environment variables.

use std::env;

/// Notification consumer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// AMQP broker URL. Required.
    pub rabbitmq_url: String,
    /// Exchange all services publish through.
    pub exchange: String,
    /// MailerSend API base URL.
    pub mailersend_api_url: String,
    /// MailerSend API key. Required.
    pub mailersend_api_key: String,
    /// Default email template. Required.
    pub mailersend_template_id: String,
    /// Sender address. Required.
    pub mailersend_email: String,
    /// Sender display name.
    pub from_name: String,
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
    /// Returns [`MissingEnv`] when a required variable is unset.
    pub fn from_env() -> Result<Self, MissingEnv> {
        Ok(Self {
            rabbitmq_url: env::var("RABBITMQ_URL").map_err(|_| MissingEnv("RABBITMQ_URL"))?,
            exchange: env::var("BROKER_EXCHANGE").unwrap_or_else(|_| "tixie".to_string()),
            mailersend_api_url: env::var("MAILERSEND_API_URL")
                .unwrap_or_else(|_| "https://api.mailersend.com".to_string()),
            mailersend_api_key: env::var("MAILERSEND_API_KEY")
                .map_err(|_| MissingEnv("MAILERSEND_API_KEY"))?,
            mailersend_template_id: env::var("MAILERSEND_TEMPLATE_ID")
                .map_err(|_| MissingEnv("MAILERSEND_TEMPLATE_ID"))?,
            mailersend_email: env::var("MAILERSEND_EMAIL")
                .map_err(|_| MissingEnv("MAILERSEND_EMAIL"))?,
            from_name: env::var("FROM_NAME").unwrap_or_else(|_| "Tixie".to_string()),
        })
    }
}
