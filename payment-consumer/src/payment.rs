//! Client for the external payment provider.
//!
//! The provider is an opaque REST endpoint that mints payment intents. The
//! caller-supplied `Idempotency-Key` header lets it deduplicate retries of
//! the same logical charge, which is what makes at-least-once delivery safe.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tixie_breaker::{BreakerError, CircuitBreaker};
use tixie_messages::ReservationCompleted;

/// Errors from a charge attempt, classified for the per-message state
/// machine: rejections are final, everything else is retryable.
#[derive(Error, Debug)]
pub enum PaymentError {
    /// The provider refused the charge; do not retry.
    #[error("payment rejected: {0}")]
    Rejected(String),
    /// The provider was unreachable or errored; retry later.
    #[error("payment provider error: {0}")]
    Transport(String),
    /// The per-call timeout elapsed; retry later.
    #[error("payment timed out")]
    Timeout,
    /// The breaker is open; retry later.
    #[error("service is temporarily unavailable")]
    Unavailable,
    /// The breaker shed the request in half-open; retry later.
    #[error("too many requests")]
    RateLimited,
}

impl PaymentError {
    /// Whether the delivery should be requeued for another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout | Self::Unavailable | Self::RateLimited
        )
    }
}

impl From<BreakerError<PaymentError>> for PaymentError {
    fn from(err: BreakerError<PaymentError>) -> Self {
        match err {
            BreakerError::Open => Self::Unavailable,
            BreakerError::TooManyRequests => Self::RateLimited,
            BreakerError::Inner(inner) => inner,
        }
    }
}

/// A minted payment intent.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    /// Provider-side intent ID.
    pub id: String,
    /// Client secret for the buyer-side confirmation flow.
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
struct IntentRequest {
    amount: i64,
    currency: &'static str,
    metadata: IntentMetadata,
}

#[derive(Debug, Serialize)]
struct IntentMetadata {
    reservation_id: String,
    event_id: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: String,
}

/// Payment provider client with its own circuit breaker.
#[derive(Debug, Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    call_timeout: Duration,
    breaker: CircuitBreaker,
}

impl PaymentClient {
    /// Create a client for the provider at `base_url`.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            secret_key: secret_key.into(),
            call_timeout,
            breaker: CircuitBreaker::with_defaults("payment-provider"),
        }
    }

    /// Stable idempotency key for a reservation's charge; identical across
    /// redeliveries of the same message.
    #[must_use]
    pub fn idempotency_key(reservation_id: i32) -> String {
        format!("reservation-{reservation_id}")
    }

    /// Create a payment intent for a completed reservation.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] classified by whether a retry makes sense.
    pub async fn create_intent(
        &self,
        reservation: &ReservationCompleted,
    ) -> Result<PaymentIntent, PaymentError> {
        let result = self
            .breaker
            .call(|| async {
                match tokio::time::timeout(self.call_timeout, self.post_intent(reservation)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(PaymentError::Timeout),
                }
            })
            .await;
        result.map_err(PaymentError::from)
    }

    async fn post_intent(
        &self,
        reservation: &ReservationCompleted,
    ) -> Result<PaymentIntent, PaymentError> {
        let request = IntentRequest {
            amount: reservation.amount,
            currency: "usd",
            metadata: IntentMetadata {
                reservation_id: reservation.reservation_id.to_string(),
                event_id: reservation.event_id.to_string(),
                user_id: reservation.user_id.to_string(),
            },
        };

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .header(
                "Idempotency-Key",
                Self::idempotency_key(reservation.reservation_id),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<PaymentIntent>()
                .await
                .map_err(|e| PaymentError::Transport(format!("unparseable intent: {e}")));
        }

        let reason = match response.json::<ProviderError>().await {
            Ok(body) => body.error,
            Err(_) => format!("provider returned status {status}"),
        };

        if status.is_client_error() {
            Err(PaymentError::Rejected(reason))
        } else {
            Err(PaymentError::Transport(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable() {
        assert_eq!(PaymentClient::idempotency_key(7), "reservation-7");
        assert_eq!(
            PaymentClient::idempotency_key(7),
            PaymentClient::idempotency_key(7)
        );
    }

    #[test]
    fn rejections_are_final_everything_else_retries() {
        assert!(!PaymentError::Rejected("card declined".to_string()).is_retryable());
        assert!(PaymentError::Timeout.is_retryable());
        assert!(PaymentError::Unavailable.is_retryable());
        assert!(PaymentError::RateLimited.is_retryable());
        assert!(PaymentError::Transport("connection refused".to_string()).is_retryable());
    }
}
