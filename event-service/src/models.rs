//! Event records and inventory arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An event row as persisted.
///
/// `tickets_left` is derived, never stored; see [`Event::tickets_left`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    /// Row ID.
    pub id: i32,
    /// Event name.
    pub name: String,
    /// ISO-8601 date string.
    pub date: String,
    /// Venue name.
    pub venue: String,
    /// Owning vendor.
    pub vendor_id: i32,
    /// Per-ticket price.
    pub price: Decimal,
    /// Total sellable inventory.
    pub total_tickets: i32,
    /// Tickets sold.
    pub sold_tickets: i32,
    /// Tickets under a pending reservation hold.
    pub tickets_reserved: i32,
    /// Seconds a reservation hold lives.
    pub reservation_timeout: i32,
}

impl Event {
    /// Tickets still available for sale or reservation.
    #[must_use]
    pub const fn tickets_left(&self) -> i32 {
        self.total_tickets - self.sold_tickets - self.tickets_reserved
    }
}

/// Inventory counters read under the row lock.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct Inventory {
    /// Total sellable inventory.
    pub total_tickets: i32,
    /// Tickets sold.
    pub sold_tickets: i32,
    /// Tickets under a pending hold.
    pub tickets_reserved: i32,
}

impl Inventory {
    /// Tickets neither sold nor held.
    #[must_use]
    pub const fn available(&self) -> i32 {
        self.total_tickets - self.sold_tickets - self.tickets_reserved
    }

    /// Whether `n` tickets can be sold without breaking
    /// `sold + reserved <= total`.
    #[must_use]
    pub const fn can_sell(&self, n: i32) -> bool {
        n > 0 && self.available() >= n
    }
}

/// Body of `POST /v1`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    /// Event name.
    pub name: String,
    /// ISO-8601 date string.
    pub date: String,
    /// Venue name.
    pub venue: String,
    /// Total sellable inventory.
    pub total_tickets: i32,
    /// Owning vendor.
    pub vendor_id: i32,
    /// Per-ticket price.
    pub price: Decimal,
    /// Seconds a reservation hold lives; defaults to 600.
    pub reservation_timeout: Option<i32>,
}

impl CreateEventRequest {
    /// Default reservation hold, in seconds.
    pub const DEFAULT_RESERVATION_TIMEOUT: i32 = 600;

    /// Validate the request, returning the first problem found.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.total_tickets < 0 {
            return Err("total_tickets must not be negative".to_string());
        }
        if self.vendor_id <= 0 {
            return Err("vendor_id must be positive".to_string());
        }
        if self.price < Decimal::ZERO {
            return Err("price must not be negative".to_string());
        }
        if let Some(timeout) = self.reservation_timeout {
            if timeout <= 0 {
                return Err("reservation_timeout must be positive".to_string());
            }
        }
        Ok(())
    }

    /// Effective reservation timeout.
    #[must_use]
    pub fn timeout(&self) -> i32 {
        self.reservation_timeout
            .unwrap_or(Self::DEFAULT_RESERVATION_TIMEOUT)
    }
}

/// Body of `PATCH /v1/:id/tickets`, the bulk purchase path.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    /// Number of tickets to buy.
    pub tickets: i32,
}

/// Event as rendered to clients, including the derived `tickets_left`.
#[derive(Debug, Serialize)]
pub struct EventResponse {
    /// The stored event fields.
    #[serde(flatten)]
    pub event: Event,
    /// Derived: `total_tickets - sold_tickets - tickets_reserved`.
    pub tickets_left: i32,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        let tickets_left = event.tickets_left();
        Self { event, tickets_left }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn inventory(total: i32, sold: i32, reserved: i32) -> Inventory {
        Inventory {
            total_tickets: total,
            sold_tickets: sold,
            tickets_reserved: reserved,
        }
    }

    #[test]
    fn available_subtracts_sold_and_reserved() {
        assert_eq!(inventory(10, 3, 2).available(), 5);
        assert_eq!(inventory(1, 0, 1).available(), 0);
    }

    #[test]
    fn can_sell_respects_reserved_holds() {
        // 2 left after the hold; 3 would overcommit the hold's ticket.
        assert!(inventory(5, 2, 1).can_sell(2));
        assert!(!inventory(5, 2, 1).can_sell(3));
        assert!(!inventory(5, 2, 1).can_sell(0));
        assert!(!inventory(5, 2, 1).can_sell(-1));
    }

    #[test]
    fn create_request_defaults_timeout() {
        let req = CreateEventRequest {
            name: "RustConf".to_string(),
            date: "2026-09-01".to_string(),
            venue: "Main Hall".to_string(),
            total_tickets: 100,
            vendor_id: 1,
            price: Decimal::new(2500, 2),
            reservation_timeout: None,
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.timeout(), 600);
    }

    #[test]
    fn create_request_rejects_non_positive_timeout() {
        let req = CreateEventRequest {
            name: "RustConf".to_string(),
            date: "2026-09-01".to_string(),
            venue: "Main Hall".to_string(),
            total_tickets: 100,
            vendor_id: 1,
            price: Decimal::new(2500, 2),
            reservation_timeout: Some(0),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn response_carries_derived_tickets_left() {
        let event = Event {
            id: 1,
            name: "RustConf".to_string(),
            date: "2026-09-01".to_string(),
            venue: "Main Hall".to_string(),
            vendor_id: 1,
            price: Decimal::new(2500, 2),
            total_tickets: 10,
            sold_tickets: 4,
            tickets_reserved: 1,
            reservation_timeout: 600,
        };

        let response = EventResponse::from(event);
        assert_eq!(response.tickets_left, 5);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["tickets_left"], 5);
        assert_eq!(json["sold_tickets"], 4);
    }
}
