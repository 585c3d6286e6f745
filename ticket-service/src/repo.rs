//! Ticket repository.

use crate::error::TicketError;
use crate::models::{EventWithTickets, Ticket, TicketStatus};
use sqlx::PgPool;
use tixie_breaker::CircuitBreaker;

/// Repository over the `tickets` table.
#[derive(Debug, Clone)]
pub struct TicketRepository {
    pool: PgPool,
    breaker: CircuitBreaker,
}

impl TicketRepository {
    /// Create a repository over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            breaker: CircuitBreaker::with_defaults("ticket-repository"),
        }
    }

    /// Insert an active ticket.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::DuplicateCode`] when the code collides and
    /// [`TicketError::AlreadyIssued`] when the reservation already has a
    /// ticket.
    pub async fn create(
        &self,
        event_id: i32,
        user_id: i32,
        ticket_code: &str,
        reservation_id: Option<i32>,
    ) -> Result<Ticket, TicketError> {
        let result = self
            .breaker
            .call(|| async {
                sqlx::query_as::<_, Ticket>(
                    "INSERT INTO tickets (event_id, user_id, ticket_code, status, reservation_id) \
                     VALUES ($1, $2, $3, $4, $5) \
                     RETURNING *",
                )
                .bind(event_id)
                .bind(user_id)
                .bind(ticket_code)
                .bind(TicketStatus::Active)
                .bind(reservation_id)
                .fetch_one(&self.pool)
                .await
                .map_err(TicketError::from_db)
            })
            .await;
        result.map_err(TicketError::from)
    }

    /// One ticket by ID.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::NotFound`] for a missing row.
    pub async fn get(&self, ticket_id: i32) -> Result<Ticket, TicketError> {
        let result = self
            .breaker
            .call(|| async {
                sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
                    .bind(ticket_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or(TicketError::NotFound)
            })
            .await;
        result.map_err(TicketError::from)
    }

    /// One ticket by its opaque code.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::NotFound`] for an unknown code.
    pub async fn get_by_code(&self, ticket_code: &str) -> Result<Ticket, TicketError> {
        let result = self
            .breaker
            .call(|| async {
                sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE ticket_code = $1")
                    .bind(ticket_code)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or(TicketError::NotFound)
            })
            .await;
        result.map_err(TicketError::from)
    }

    /// The ticket issued for a reservation, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Database`] on query failure.
    pub async fn get_by_reservation(
        &self,
        reservation_id: i32,
    ) -> Result<Option<Ticket>, TicketError> {
        let result = self
            .breaker
            .call(|| async {
                let ticket =
                    sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE reservation_id = $1")
                        .bind(reservation_id)
                        .fetch_optional(&self.pool)
                        .await?;
                Ok(ticket)
            })
            .await;
        result.map_err(TicketError::from)
    }

    /// All tickets for an event.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Database`] on query failure.
    pub async fn list_by_event(&self, event_id: i32) -> Result<Vec<Ticket>, TicketError> {
        let result = self
            .breaker
            .call(|| async {
                let tickets =
                    sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE event_id = $1 ORDER BY id")
                        .bind(event_id)
                        .fetch_all(&self.pool)
                        .await?;
                Ok(tickets)
            })
            .await;
        result.map_err(TicketError::from)
    }

    /// Transition an `active` ticket to `status`. The status guard is in the
    /// UPDATE itself so racing check-ins cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::NotActive`] when the ticket exists but is not
    /// `active`.
    pub async fn update_status(
        &self,
        ticket_id: i32,
        status: TicketStatus,
    ) -> Result<Ticket, TicketError> {
        let result = self
            .breaker
            .call(|| async {
                sqlx::query_as::<_, Ticket>(
                    "UPDATE tickets SET status = $1 WHERE id = $2 AND status = $3 RETURNING *",
                )
                .bind(status)
                .bind(ticket_id)
                .bind(TicketStatus::Active)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(TicketError::NotActive)
            })
            .await;
        result.map_err(TicketError::from)
    }

    /// Events that have at least one ticket, with counts.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Database`] on query failure.
    pub async fn events_with_tickets(&self) -> Result<Vec<EventWithTickets>, TicketError> {
        let result = self
            .breaker
            .call(|| async {
                let events = sqlx::query_as::<_, EventWithTickets>(
                    "SELECT event_id, COUNT(*) AS ticket_count FROM tickets \
                     GROUP BY event_id ORDER BY event_id",
                )
                .fetch_all(&self.pool)
                .await?;
                Ok(events)
            })
            .await;
        result.map_err(TicketError::from)
    }
}
