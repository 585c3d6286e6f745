//! Topic names and wire payloads for the Tixie message bus.
//!
//! Every service publishes and consumes JSON envelopes with snake_case keys;
//! the routing key is the topic name. Keeping the whole vocabulary in one
//! crate means a payload change is a single-place edit and producers and
//! consumers can never drift apart silently.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical routing keys.
///
/// Consumers bind durable queues to these; producers publish with them.
pub mod topics {
    /// Published when a new reservation is accepted.
    pub const RESERVATION_CREATED: &str = "reservation.created";
    /// Published when a buyer confirms intent to pay; kicks off payment.
    pub const RESERVATION_COMPLETED: &str = "reservation.completed";
    /// Published when a reservation's hold is released.
    pub const RESERVATION_EXPIRED: &str = "reservation.expired";
    /// Published by the payment consumer on a successful charge.
    pub const PAYMENT_PROCESSED: &str = "payment.processed";
    /// Published by the payment consumer when the provider rejects a charge.
    pub const PAYMENT_FAILED: &str = "payment.failed";
    /// Published by the ticket service once a ticket is materialized.
    pub const TICKET_ISSUED: &str = "ticket.issued";
    /// Published by anyone who wants an email sent.
    pub const NOTIFICATION_EMAIL: &str = "notification.email";
    /// Legacy routing key for email notifications; still bound by the
    /// notification consumer for older producers.
    pub const NOTIFICATION_EMAIL_LEGACY: &str = "email";
    /// Published by the vendor service when an event goes on sale.
    pub const EVENT_CREATED: &str = "event.created";
}

/// Published on [`topics::RESERVATION_CREATED`] for audit and analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCreated {
    /// Reservation record ID.
    pub reservation_id: i32,
    /// Event the hold is against.
    pub event_id: i32,
    /// Buyer.
    pub user_id: i32,
    /// Unix timestamp at which the hold lapses.
    pub expiration_time: i64,
}

/// Published on [`topics::RESERVATION_COMPLETED`]; the handoff into payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCompleted {
    /// Reservation record ID.
    pub reservation_id: i32,
    /// Event the sale is against.
    pub event_id: i32,
    /// Buyer to charge.
    pub user_id: i32,
    /// Charge amount in cents.
    pub amount: i64,
}

/// Published on [`topics::RESERVATION_EXPIRED`] when a hold is released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationExpired {
    /// Reservation record ID.
    pub reservation_id: i32,
    /// Event whose hold was released.
    pub event_id: i32,
}

/// Published on [`topics::PAYMENT_PROCESSED`] after a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProcessed {
    /// Reservation the charge settles.
    pub reservation_id: i32,
    /// Amount charged, in cents.
    pub amount: i64,
    /// Provider-side payment intent ID.
    pub payment_id: String,
}

/// Published on [`topics::PAYMENT_FAILED`] when the provider rejects a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailed {
    /// Reservation whose charge failed.
    pub reservation_id: i32,
    /// Human-readable failure reason.
    pub reason: String,
}

/// Published on [`topics::TICKET_ISSUED`] once a ticket exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketIssued {
    /// Ticket record ID.
    pub ticket_id: i32,
    /// Opaque 36-character ticket code.
    pub ticket_code: String,
    /// Reservation the ticket fulfils.
    pub reservation_id: i32,
    /// Ticket holder.
    pub user_id: i32,
    /// Event the ticket admits to.
    pub event_id: i32,
    /// Where the ticket email goes.
    pub recipient_email: String,
}

/// Published on [`topics::NOTIFICATION_EMAIL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailNotification {
    /// Recipient address.
    pub recipient_email: String,
    /// Subject line.
    pub subject: String,
    /// Provider-side template to render.
    pub template_id: String,
    /// Substitutions for the template.
    pub template_data: HashMap<String, serde_json::Value>,
}

/// Legacy payload still seen on the [`topics::NOTIFICATION_EMAIL_LEGACY`]
/// routing key: just a recipient and the ticket code to embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyEmailNotification {
    /// Recipient address.
    pub recipient_email: String,
    /// Ticket code to render into the template.
    pub ticket_id: String,
}

/// Published on [`topics::EVENT_CREATED`] by the vendor service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCreated {
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
    /// Per-ticket price as a decimal string.
    pub price: String,
    /// Seconds a reservation hold lives; `None` takes the service default.
    pub reservation_timeout: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_use_snake_case_keys() {
        let msg = ReservationCompleted {
            reservation_id: 7,
            event_id: 3,
            user_id: 42,
            amount: 2500,
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["reservation_id"], 7);
        assert_eq!(json["amount"], 2500);
    }

    #[test]
    fn legacy_email_payload_decodes() {
        let body = r#"{"recipient_email":"a@b.c","ticket_id":"550e8400-e29b-41d4-a716-446655440000"}"#;
        let msg: LegacyEmailNotification = serde_json::from_str(body).unwrap();
        assert_eq!(msg.recipient_email, "a@b.c");
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        // Consumers must accept payloads from newer producers.
        let body = r#"{"reservation_id":1,"event_id":2,"user_id":3,"amount":100,"currency":"usd"}"#;
        let msg: ReservationCompleted = serde_json::from_str(body).unwrap();
        assert_eq!(msg.amount, 100);
    }
}
