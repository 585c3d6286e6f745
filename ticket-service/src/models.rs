//! Ticket records.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Ticket lifecycle state.
///
/// Legal transitions: `active -> used` (gate check-in) and
/// `active -> cancelled` (refund). Nothing leaves `used` or `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
pub enum TicketStatus {
    /// Valid for entry.
    Active,
    /// Checked in at the gate.
    Used,
    /// Refunded.
    Cancelled,
}

impl TicketStatus {
    /// Whether moving from `self` to `to` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        self == Self::Active && (to == Self::Used || to == Self::Cancelled)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Used => write!(f, "used"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "used" => Ok(Self::Used),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!(
                "invalid status {other:?}: must be active, used, or cancelled"
            )),
        }
    }
}

/// A ticket row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    /// Row ID.
    pub id: i32,
    /// Event the ticket admits to; held by value.
    pub event_id: i32,
    /// Ticket holder.
    pub user_id: i32,
    /// Opaque unique 36-character code, rendered into the QR.
    pub ticket_code: String,
    /// Lifecycle state.
    pub status: TicketStatus,
    /// Reservation this ticket fulfils; `None` for direct creation.
    pub reservation_id: Option<i32>,
}

/// Body of `POST /v1`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicketRequest {
    /// Event to issue against.
    pub event_id: i32,
    /// Ticket holder.
    pub user_id: i32,
}

/// Body of `PUT /v1/:id/status`. The status arrives as a string so invalid
/// values get a clean 400 instead of a deserializer rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    /// Requested status.
    pub status: String,
}

/// One row of the events-with-tickets view.
#[derive(Debug, Clone, FromRow)]
pub struct EventWithTickets {
    /// Event ID.
    pub event_id: i32,
    /// Tickets issued for it.
    pub ticket_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_can_be_used_or_cancelled() {
        assert!(TicketStatus::Active.can_transition_to(TicketStatus::Used));
        assert!(TicketStatus::Active.can_transition_to(TicketStatus::Cancelled));
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(!TicketStatus::Used.can_transition_to(TicketStatus::Active));
        assert!(!TicketStatus::Used.can_transition_to(TicketStatus::Cancelled));
        assert!(!TicketStatus::Cancelled.can_transition_to(TicketStatus::Used));
        assert!(!TicketStatus::Active.can_transition_to(TicketStatus::Active));
    }

    #[test]
    fn status_parses_from_lowercase_strings() {
        assert_eq!("used".parse::<TicketStatus>(), Ok(TicketStatus::Used));
        assert!("USED".parse::<TicketStatus>().is_err());
        assert!("refunded".parse::<TicketStatus>().is_err());
    }
}
