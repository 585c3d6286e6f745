//! Typed HTTP clients for the services the ticket service consults.

use crate::error::TicketError;
use serde::Deserialize;
use tixie_breaker::CircuitBreaker;

/// Client for the event service; existence checks and name lookups.
#[derive(Debug, Clone)]
pub struct EventServiceClient {
    http: reqwest::Client,
    base_url: String,
    breaker: CircuitBreaker,
}

#[derive(Debug, Deserialize)]
struct EventName {
    name: String,
}

impl EventServiceClient {
    /// Create a client for the event service at `base_url`.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            breaker: CircuitBreaker::with_defaults("event-service"),
        }
    }

    /// Confirm the event exists.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::InvalidInput`] for an unknown event.
    pub async fn validate_event(&self, event_id: i32) -> Result<(), TicketError> {
        self.get_name(event_id).await.map(|_| ())
    }

    /// The event's name, for enriching views. `None` when the event service
    /// cannot answer; the view degrades instead of failing.
    pub async fn event_name(&self, event_id: i32) -> Option<String> {
        match self.get_name(event_id).await {
            Ok(name) => Some(name),
            Err(error) => {
                tracing::debug!(event_id, error = %error, "could not resolve event name");
                None
            }
        }
    }

    async fn get_name(&self, event_id: i32) -> Result<String, TicketError> {
        let result = self
            .breaker
            .call(|| async {
                let response = self
                    .http
                    .get(format!("{}/v1/{event_id}", self.base_url))
                    .send()
                    .await
                    .map_err(|e| TicketError::Upstream(format!("event service: {e}")))?;

                match response.status() {
                    reqwest::StatusCode::OK => response
                        .json::<EventName>()
                        .await
                        .map(|e| e.name)
                        .map_err(|e| TicketError::Upstream(format!("event service: {e}"))),
                    reqwest::StatusCode::NOT_FOUND => Err(TicketError::InvalidInput(
                        format!("invalid event_id: event {event_id} not found"),
                    )),
                    status => Err(TicketError::Upstream(format!(
                        "event service returned status {status}"
                    ))),
                }
            })
            .await;
        result.map_err(TicketError::from)
    }
}

/// Client for the user service; existence checks and email lookups.
#[derive(Debug, Clone)]
pub struct UserServiceClient {
    http: reqwest::Client,
    base_url: String,
    breaker: CircuitBreaker,
}

#[derive(Debug, Deserialize)]
struct UserEmail {
    email: String,
}

impl UserServiceClient {
    /// Create a client for the user service at `base_url`.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            breaker: CircuitBreaker::with_defaults("user-service"),
        }
    }

    /// Confirm the user exists.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::InvalidInput`] for an unknown user.
    pub async fn validate_user(&self, user_id: i32) -> Result<(), TicketError> {
        let result = self
            .breaker
            .call(|| async {
                let response = self
                    .http
                    .get(format!("{}/v1/{user_id}", self.base_url))
                    .send()
                    .await
                    .map_err(|e| TicketError::Upstream(format!("user service: {e}")))?;

                match response.status() {
                    reqwest::StatusCode::OK => Ok(()),
                    reqwest::StatusCode::NOT_FOUND => Err(TicketError::InvalidInput(format!(
                        "invalid user_id: user {user_id} not found"
                    ))),
                    status => Err(TicketError::Upstream(format!(
                        "user service returned status {status}"
                    ))),
                }
            })
            .await;
        result.map_err(TicketError::from)
    }

    /// The user's email for ticket delivery. Empty lookups degrade to `None`
    /// rather than blocking issuance.
    pub async fn email(&self, user_id: i32) -> Option<String> {
        let result = self
            .breaker
            .call(|| async {
                let response = self
                    .http
                    .get(format!("{}/v1/email/{user_id}", self.base_url))
                    .send()
                    .await
                    .map_err(|e| TicketError::Upstream(format!("user service: {e}")))?;

                if response.status() != reqwest::StatusCode::OK {
                    return Err(TicketError::Upstream(format!(
                        "user service returned status {}",
                        response.status()
                    )));
                }
                response
                    .json::<UserEmail>()
                    .await
                    .map(|u| u.email)
                    .map_err(|e| TicketError::Upstream(format!("user service: {e}")))
            })
            .await;

        match result {
            Ok(email) => Some(email),
            Err(error) => {
                tracing::warn!(user_id, error = %error, "could not resolve user email");
                None
            }
        }
    }
}

/// What ticket issuance needs to know about a reservation.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationView {
    /// Reservation ID.
    pub id: i32,
    /// Event the reservation was against.
    pub event_id: i32,
    /// Buyer.
    pub user_id: i32,
}

/// Client for the reservation service; resolves reservation IDs carried on
/// `payment.processed` messages.
#[derive(Debug, Clone)]
pub struct ReservationServiceClient {
    http: reqwest::Client,
    base_url: String,
    breaker: CircuitBreaker,
}

impl ReservationServiceClient {
    /// Create a client for the reservation service at `base_url`.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            breaker: CircuitBreaker::with_defaults("reservation-service"),
        }
    }

    /// Fetch one reservation.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::NotFound`] for an unknown reservation and
    /// [`TicketError::Upstream`] for transport or server failures.
    pub async fn get(&self, reservation_id: i32) -> Result<ReservationView, TicketError> {
        let result = self
            .breaker
            .call(|| async {
                let response = self
                    .http
                    .get(format!("{}/v1/{reservation_id}", self.base_url))
                    .send()
                    .await
                    .map_err(|e| TicketError::Upstream(format!("reservation service: {e}")))?;

                match response.status() {
                    reqwest::StatusCode::OK => response
                        .json::<ReservationView>()
                        .await
                        .map_err(|e| TicketError::Upstream(format!("reservation service: {e}"))),
                    reqwest::StatusCode::NOT_FOUND => Err(TicketError::NotFound),
                    status => Err(TicketError::Upstream(format!(
                        "reservation service returned status {status}"
                    ))),
                }
            })
            .await;
        result.map_err(TicketError::from)
    }
}
