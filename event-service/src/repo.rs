//! Inventory repository.
//!
//! Every counter mutation runs in a single transaction that locks the event
//! row with `SELECT ... FOR UPDATE`, validates the inventory invariant and
//! only then updates. Because the three counter transitions below are the
//! only writers, `sold_tickets + tickets_reserved <= total_tickets` holds
//! across any interleaving.
//!
//! The database is an external dependency like any other, so all access is
//! wrapped in the service's circuit breaker.

use crate::error::EventError;
use crate::models::{CreateEventRequest, Event, Inventory};
use sqlx::PgPool;
use tixie_breaker::CircuitBreaker;

/// Repository over the `events` table.
#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: PgPool,
    breaker: CircuitBreaker,
}

impl EventRepository {
    /// Create a repository over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            breaker: CircuitBreaker::with_defaults("event-repository"),
        }
    }

    /// Insert a new event with zeroed counters.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Database`] on insert failure.
    pub async fn create(&self, request: &CreateEventRequest) -> Result<Event, EventError> {
        let result = self
            .breaker
            .call(|| async {
                let event = sqlx::query_as::<_, Event>(
                    "INSERT INTO events \
                     (name, date, venue, vendor_id, price, total_tickets, sold_tickets, tickets_reserved, reservation_timeout) \
                     VALUES ($1, $2, $3, $4, $5, $6, 0, 0, $7) \
                     RETURNING *",
                )
                .bind(&request.name)
                .bind(&request.date)
                .bind(&request.venue)
                .bind(request.vendor_id)
                .bind(request.price)
                .bind(request.total_tickets)
                .bind(request.timeout())
                .fetch_one(&self.pool)
                .await?;
                Ok(event)
            })
            .await;
        result.map_err(EventError::from)
    }

    /// All events.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Database`] on query failure.
    pub async fn list(&self) -> Result<Vec<Event>, EventError> {
        let result = self
            .breaker
            .call(|| async {
                let events = sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?;
                Ok(events)
            })
            .await;
        result.map_err(EventError::from)
    }

    /// One event by ID.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotFound`] for a missing row.
    pub async fn get(&self, event_id: i32) -> Result<Event, EventError> {
        let result = self
            .breaker
            .call(|| async {
                sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
                    .bind(event_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or(EventError::NotFound)
            })
            .await;
        result.map_err(EventError::from)
    }

    /// Place a one-ticket hold: `tickets_reserved + 1` under the row lock.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NoTicketsAvailable`] when
    /// `total - sold - reserved` is zero, [`EventError::NotFound`] for a
    /// missing event.
    pub async fn reserve_ticket(&self, event_id: i32) -> Result<(), EventError> {
        let result = self
            .breaker
            .call(|| async {
                let mut tx = self.pool.begin().await?;

                let inventory = lock_inventory(&mut tx, event_id).await?;
                if inventory.available() <= 0 {
                    return Err(EventError::NoTicketsAvailable);
                }

                sqlx::query("UPDATE events SET tickets_reserved = tickets_reserved + 1 WHERE id = $1")
                    .bind(event_id)
                    .execute(&mut *tx)
                    .await?;

                tx.commit().await?;
                Ok(())
            })
            .await;
        result.map_err(EventError::from)
    }

    /// Convert one hold into a sale: `reserved - 1`, `sold + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NothingReserved`] when no hold exists.
    pub async fn complete_reservation(&self, event_id: i32) -> Result<(), EventError> {
        let result = self
            .breaker
            .call(|| async {
                let mut tx = self.pool.begin().await?;

                let inventory = lock_inventory(&mut tx, event_id).await?;
                if inventory.tickets_reserved <= 0 {
                    return Err(EventError::NothingReserved);
                }

                sqlx::query(
                    "UPDATE events \
                     SET tickets_reserved = tickets_reserved - 1, sold_tickets = sold_tickets + 1 \
                     WHERE id = $1",
                )
                .bind(event_id)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(())
            })
            .await;
        result.map_err(EventError::from)
    }

    /// Release one hold without selling: `reserved - 1`.
    ///
    /// Refusing when `tickets_reserved` is zero is what makes the expiry
    /// sweeper's retries safe.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NothingReserved`] when no hold exists.
    pub async fn release_reservation(&self, event_id: i32) -> Result<(), EventError> {
        let result = self
            .breaker
            .call(|| async {
                let mut tx = self.pool.begin().await?;

                let inventory = lock_inventory(&mut tx, event_id).await?;
                if inventory.tickets_reserved <= 0 {
                    return Err(EventError::NothingReserved);
                }

                sqlx::query("UPDATE events SET tickets_reserved = tickets_reserved - 1 WHERE id = $1")
                    .bind(event_id)
                    .execute(&mut *tx)
                    .await?;

                tx.commit().await?;
                Ok(())
            })
            .await;
        result.map_err(EventError::from)
    }

    /// Bulk purchase: `sold + n` when `n` tickets are actually available,
    /// counting outstanding holds.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidPurchase`] for a non-positive `n` or
    /// insufficient inventory.
    pub async fn update_tickets_sold(&self, event_id: i32, tickets: i32) -> Result<(), EventError> {
        let result = self
            .breaker
            .call(|| async {
                if tickets <= 0 {
                    return Err(EventError::InvalidPurchase(
                        "tickets must be greater than zero".to_string(),
                    ));
                }

                let mut tx = self.pool.begin().await?;

                let inventory = lock_inventory(&mut tx, event_id).await?;
                if !inventory.can_sell(tickets) {
                    return Err(EventError::InvalidPurchase(
                        "not enough tickets available".to_string(),
                    ));
                }

                sqlx::query("UPDATE events SET sold_tickets = sold_tickets + $1 WHERE id = $2")
                    .bind(tickets)
                    .bind(event_id)
                    .execute(&mut *tx)
                    .await?;

                tx.commit().await?;
                Ok(())
            })
            .await;
        result.map_err(EventError::from)
    }
}

/// Read the counters with an exclusive row lock, holding it until the
/// surrounding transaction commits or rolls back.
async fn lock_inventory(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event_id: i32,
) -> Result<Inventory, EventError> {
    sqlx::query_as::<_, Inventory>(
        "SELECT total_tickets, sold_tickets, tickets_reserved FROM events WHERE id = $1 FOR UPDATE",
    )
    .bind(event_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(EventError::NotFound)
}
