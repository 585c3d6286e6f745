//! MailerSend REST client.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tixie_breaker::{BreakerError, CircuitBreaker};

/// Errors from the email provider.
#[derive(Error, Debug)]
pub enum MailError {
    /// Provider unreachable or refused the send.
    #[error("failed to send email: {0}")]
    Send(String),
    /// The provider's breaker is open.
    #[error("service is temporarily unavailable")]
    Unavailable,
    /// The provider's breaker shed the request in half-open.
    #[error("too many requests")]
    RateLimited,
}

impl From<BreakerError<MailError>> for MailError {
    fn from(err: BreakerError<MailError>) -> Self {
        match err {
            BreakerError::Open => Self::Unavailable,
            BreakerError::TooManyRequests => Self::RateLimited,
            BreakerError::Inner(inner) => inner,
        }
    }
}

#[derive(Debug, Serialize)]
struct Party<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    email: &'a str,
    data: &'a HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: Party<'a>,
    to: Vec<Party<'a>>,
    subject: &'a str,
    template_id: &'a str,
    personalization: Vec<Personalization<'a>>,
}

/// Templated email sender over MailerSend's REST API.
#[derive(Debug, Clone)]
pub struct Mailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from_email: String,
    from_name: String,
    default_template_id: String,
    breaker: CircuitBreaker,
}

impl Mailer {
    /// Subject line for ticket delivery mails.
    pub const TICKET_SUBJECT: &'static str = "Your QR Code Ticket";

    /// Create a mailer.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
        default_template_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            from_email: from_email.into(),
            from_name: from_name.into(),
            default_template_id: default_template_id.into(),
            breaker: CircuitBreaker::with_defaults("mailersend"),
        }
    }

    /// Send the standard ticket email, templating in the ticket code.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when the provider cannot be reached or refuses
    /// the send.
    pub async fn send_ticket_email(&self, to: &str, ticket_id: &str) -> Result<(), MailError> {
        let mut data = HashMap::new();
        data.insert(
            "ticket_id".to_string(),
            serde_json::Value::String(ticket_id.to_string()),
        );
        self.send(
            to,
            Self::TICKET_SUBJECT,
            &self.default_template_id,
            &data,
        )
        .await
    }

    /// Send an arbitrary templated email.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when the provider cannot be reached or refuses
    /// the send.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        template_id: &str,
        data: &HashMap<String, serde_json::Value>,
    ) -> Result<(), MailError> {
        let result = self
            .breaker
            .call(|| async {
                let request = EmailRequest {
                    from: Party {
                        email: &self.from_email,
                        name: Some(&self.from_name),
                    },
                    to: vec![Party { email: to, name: None }],
                    subject,
                    template_id,
                    personalization: vec![Personalization { email: to, data }],
                };

                let response = self
                    .http
                    .post(format!("{}/v1/email", self.api_url))
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| MailError::Send(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(MailError::Send(format!(
                        "provider returned status {}",
                        response.status()
                    )));
                }

                if let Some(message_id) = response.headers().get("x-message-id") {
                    tracing::info!(message_id = ?message_id, "email sent");
                } else {
                    tracing::info!("email sent");
                }
                Ok(())
            })
            .await;
        result.map_err(MailError::from)
    }
}
