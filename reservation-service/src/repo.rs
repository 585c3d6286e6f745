//! Reservation repository.
//!
//! Rows are never deleted; the status column is the only thing that moves,
//! and only along `pending -> completed` or `pending -> expired`. The
//! status-guarded UPDATEs below enforce that DAG at the database, so a racing
//! timer and sweeper cannot both claim the same transition.

use crate::error::ReservationError;
use crate::models::{Reservation, ReservationStatus};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tixie_breaker::CircuitBreaker;

/// Repository over the `reservations` table.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: PgPool,
    breaker: CircuitBreaker,
}

impl ReservationRepository {
    /// Create a repository over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            breaker: CircuitBreaker::with_defaults("reservation-repository"),
        }
    }

    /// Insert a pending reservation expiring `timeout_seconds` from now.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidInput`] for a non-positive timeout
    /// and [`ReservationError::Database`] on insert failure.
    pub async fn create(
        &self,
        event_id: i32,
        user_id: i32,
        timeout_seconds: i32,
    ) -> Result<Reservation, ReservationError> {
        if timeout_seconds <= 0 {
            return Err(ReservationError::InvalidInput(
                "reservation timeout must be positive".to_string(),
            ));
        }

        let created_at = Utc::now();
        let expiration_time = created_at + Duration::seconds(i64::from(timeout_seconds));

        let result = self
            .breaker
            .call(|| async {
                let reservation = sqlx::query_as::<_, Reservation>(
                    "INSERT INTO reservations (event_id, user_id, status, created_at, expiration_time) \
                     VALUES ($1, $2, $3, $4, $5) \
                     RETURNING *",
                )
                .bind(event_id)
                .bind(user_id)
                .bind(ReservationStatus::Pending)
                .bind(created_at)
                .bind(expiration_time)
                .fetch_one(&self.pool)
                .await?;
                Ok(reservation)
            })
            .await;
        result.map_err(ReservationError::from)
    }

    /// One reservation by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::NotFound`] for a missing row.
    pub async fn get(&self, reservation_id: i32) -> Result<Reservation, ReservationError> {
        let result = self
            .breaker
            .call(|| async {
                sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
                    .bind(reservation_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or(ReservationError::NotFound)
            })
            .await;
        result.map_err(ReservationError::from)
    }

    /// Move a pending reservation to `completed`.
    ///
    /// Returns `false` when the row was no longer pending, which means a
    /// timer or sweeper got there first.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Database`] on update failure.
    pub async fn complete(&self, reservation_id: i32) -> Result<bool, ReservationError> {
        self.transition(reservation_id, ReservationStatus::Completed)
            .await
    }

    /// Move a pending reservation to `expired`.
    ///
    /// Returns `false` when the row was no longer pending.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Database`] on update failure.
    pub async fn expire(&self, reservation_id: i32) -> Result<bool, ReservationError> {
        self.transition(reservation_id, ReservationStatus::Expired)
            .await
    }

    async fn transition(
        &self,
        reservation_id: i32,
        to: ReservationStatus,
    ) -> Result<bool, ReservationError> {
        let result = self
            .breaker
            .call(|| async {
                let done = sqlx::query(
                    "UPDATE reservations SET status = $1 WHERE id = $2 AND status = $3",
                )
                .bind(to)
                .bind(reservation_id)
                .bind(ReservationStatus::Pending)
                .execute(&self.pool)
                .await?;
                Ok(done.rows_affected() > 0)
            })
            .await;
        result.map_err(ReservationError::from)
    }

    /// All reservations still `pending` whose expiration has passed; the
    /// sweeper's work list.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Database`] on query failure.
    pub async fn expired_pending(&self) -> Result<Vec<Reservation>, ReservationError> {
        let result = self
            .breaker
            .call(|| async {
                let reservations = sqlx::query_as::<_, Reservation>(
                    "SELECT * FROM reservations WHERE status = $1 AND expiration_time < $2",
                )
                .bind(ReservationStatus::Pending)
                .bind(Utc::now())
                .fetch_all(&self.pool)
                .await?;
                Ok(reservations)
            })
            .await;
        result.map_err(ReservationError::from)
    }
}
