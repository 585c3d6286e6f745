//! Reservation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Reservation lifecycle state.
///
/// Transitions form a DAG: `pending -> completed` or `pending -> expired`;
/// nothing else is legal, and rows are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "reservation_status", rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Hold is live; one unit of `tickets_reserved` is held on the event.
    Pending,
    /// Buyer confirmed intent to pay; the hold became a sale.
    Completed,
    /// The hold lapsed and was released.
    Expired,
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// A reservation row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    /// Row ID.
    pub id: i32,
    /// Event the hold is against; held by value, never a foreign key.
    pub event_id: i32,
    /// Buyer.
    pub user_id: i32,
    /// Lifecycle state.
    pub status: ReservationStatus,
    /// When the hold was placed.
    pub created_at: DateTime<Utc>,
    /// `created_at + event.reservation_timeout`.
    pub expiration_time: DateTime<Utc>,
}

impl Reservation {
    /// Whether the hold can still be completed at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expiration_time > now
    }
}

/// Body of `POST /v1`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRequest {
    /// Event to hold a ticket on.
    pub event_id: i32,
    /// Buyer placing the hold.
    pub user_id: i32,
}

/// Body of `POST /v1/complete`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteRequest {
    /// Reservation to complete.
    pub reservation_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reservation(status: ReservationStatus, expires_in: Duration) -> (Reservation, DateTime<Utc>) {
        let now = Utc::now();
        (
            Reservation {
                id: 1,
                event_id: 1,
                user_id: 42,
                status,
                created_at: now - Duration::seconds(10),
                expiration_time: now + expires_in,
            },
            now,
        )
    }

    #[test]
    fn pending_unexpired_is_live() {
        let (r, now) = reservation(ReservationStatus::Pending, Duration::seconds(60));
        assert!(r.is_live(now));
    }

    #[test]
    fn pending_past_expiry_is_not_live() {
        let (r, now) = reservation(ReservationStatus::Pending, Duration::seconds(-1));
        assert!(!r.is_live(now));
    }

    #[test]
    fn completed_is_never_live() {
        let (r, now) = reservation(ReservationStatus::Completed, Duration::seconds(60));
        assert!(!r.is_live(now));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ReservationStatus::Pending).unwrap(),
            "\"pending\""
        );
    }
}
