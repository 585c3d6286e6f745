//! Notification consumer: turns bus messages into templated emails.
//!
//! Consumes the canonical `notification.email` topic, `ticket.issued`
//! announcements, and the legacy `email` routing key. Email failures are
//! logged and the delivery dropped; nothing upstream retries mail.

pub mod config;
pub mod consumer;
pub mod mailer;
