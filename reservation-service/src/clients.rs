//! Typed HTTP clients for the services this one orchestrates.
//!
//! Each client owns a circuit breaker named for its dependency, so an outage
//! in one collaborator never poisons calls to another.

use crate::error::ReservationError;
use rust_decimal::Decimal;
use serde::Deserialize;
use tixie_breaker::CircuitBreaker;

/// Error body shape shared by all Tixie services.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

async fn failure_reason(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => format!("status {status}: {}", body.error),
        Err(_) => format!("status {status}"),
    }
}

/// What the reservation flow needs to know about an event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventSummary {
    /// Event ID.
    pub id: i32,
    /// Per-ticket price.
    pub price: Decimal,
    /// Derived sellable inventory.
    pub tickets_left: i32,
    /// Seconds a hold lives.
    pub reservation_timeout: i32,
}

/// Client for the event service's inventory operations.
#[derive(Debug, Clone)]
pub struct EventServiceClient {
    http: reqwest::Client,
    base_url: String,
    breaker: CircuitBreaker,
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

    /// Fetch an event, including its derived `tickets_left`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidInput`] for an unknown event and
    /// [`ReservationError::EventService`] for transport or server failures.
    pub async fn get_event(&self, event_id: i32) -> Result<EventSummary, ReservationError> {
        let result = self
            .breaker
            .call(|| async {
                let response = self
                    .http
                    .get(format!("{}/v1/{event_id}", self.base_url))
                    .send()
                    .await
                    .map_err(|e| ReservationError::EventService(e.to_string()))?;

                match response.status() {
                    reqwest::StatusCode::OK => response
                        .json::<EventSummary>()
                        .await
                        .map_err(|e| ReservationError::EventService(e.to_string())),
                    reqwest::StatusCode::NOT_FOUND => {
                        Err(ReservationError::InvalidInput("event not found".to_string()))
                    }
                    _ => Err(ReservationError::EventService(
                        failure_reason(response).await,
                    )),
                }
            })
            .await;
        result.map_err(ReservationError::from)
    }

    /// Place a one-ticket hold.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::NoTicketsAvailable`] when inventory is
    /// exhausted.
    pub async fn reserve(&self, event_id: i32) -> Result<(), ReservationError> {
        self.counter_op(event_id, "reserve", ReservationError::NoTicketsAvailable)
            .await
    }

    /// Convert one hold into a sale.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::NothingReserved`] when no hold exists.
    pub async fn complete_reservation(&self, event_id: i32) -> Result<(), ReservationError> {
        self.counter_op(
            event_id,
            "complete-reservation",
            ReservationError::NothingReserved,
        )
        .await
    }

    /// Release one hold without selling.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::NothingReserved`] when no hold exists,
    /// which callers on the expiry path treat as already-released.
    pub async fn release_reservation(&self, event_id: i32) -> Result<(), ReservationError> {
        self.counter_op(
            event_id,
            "release-reservation",
            ReservationError::NothingReserved,
        )
        .await
    }

    async fn counter_op(
        &self,
        event_id: i32,
        op: &str,
        on_conflict: ReservationError,
    ) -> Result<(), ReservationError> {
        let result = self
            .breaker
            .call(|| async {
                let response = self
                    .http
                    .post(format!("{}/v1/{event_id}/{op}", self.base_url))
                    .send()
                    .await
                    .map_err(|e| ReservationError::EventService(e.to_string()))?;

                match response.status() {
                    reqwest::StatusCode::OK => Ok(()),
                    reqwest::StatusCode::CONFLICT => Err(on_conflict),
                    _ => Err(ReservationError::EventService(
                        failure_reason(response).await,
                    )),
                }
            })
            .await;
        result.map_err(ReservationError::from)
    }
}

/// Client for the user service; the reservation flow only checks existence.
#[derive(Debug, Clone)]
pub struct UserServiceClient {
    http: reqwest::Client,
    base_url: String,
    breaker: CircuitBreaker,
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
    /// Returns [`ReservationError::InvalidInput`] for an unknown user and
    /// [`ReservationError::UserService`] for transport or server failures.
    pub async fn verify_user(&self, user_id: i32) -> Result<(), ReservationError> {
        let result = self
            .breaker
            .call(|| async {
                let response = self
                    .http
                    .get(format!("{}/v1/{user_id}", self.base_url))
                    .send()
                    .await
                    .map_err(|e| ReservationError::UserService(e.to_string()))?;

                match response.status() {
                    reqwest::StatusCode::OK => Ok(()),
                    reqwest::StatusCode::NOT_FOUND => {
                        Err(ReservationError::InvalidInput("user not found".to_string()))
                    }
                    _ => Err(ReservationError::UserService(
                        failure_reason(response).await,
                    )),
                }
            })
            .await;
        result.map_err(ReservationError::from)
    }
}

/// What ticket verification needs from the ticket service.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketSummary {
    /// Ticket record ID.
    pub ticket_id: i32,
    /// Event the ticket admits to.
    pub event_id: i32,
    /// Ticket holder.
    pub user_id: i32,
    /// Lifecycle status string (`active`, `used`, `cancelled`).
    pub status: String,
}

/// Client for the ticket service's verification lookup.
#[derive(Debug, Clone)]
pub struct TicketServiceClient {
    http: reqwest::Client,
    base_url: String,
    breaker: CircuitBreaker,
}

impl TicketServiceClient {
    /// Create a client for the ticket service at `base_url`.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            breaker: CircuitBreaker::with_defaults("ticket-service"),
        }
    }

    /// Look up a ticket by its opaque code. `None` means no such ticket.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::TicketService`] for transport or server
    /// failures.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<TicketSummary>, ReservationError> {
        let result = self
            .breaker
            .call(|| async {
                let response = self
                    .http
                    .get(format!("{}/v1/verify/{code}", self.base_url))
                    .send()
                    .await
                    .map_err(|e| ReservationError::TicketService(e.to_string()))?;

                match response.status() {
                    reqwest::StatusCode::OK => response
                        .json::<TicketSummary>()
                        .await
                        .map(Some)
                        .map_err(|e| ReservationError::TicketService(e.to_string())),
                    reqwest::StatusCode::NOT_FOUND => Ok(None),
                    _ => Err(ReservationError::TicketService(
                        failure_reason(response).await,
                    )),
                }
            })
            .await;
        result.map_err(ReservationError::from)
    }
}
