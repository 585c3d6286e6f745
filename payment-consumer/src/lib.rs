//! Payment consumer: a worker pool over `reservation.completed`.
//!
//! Each worker charges the external payment provider inside the shared
//! circuit breaker with a 30-second per-call timeout, then publishes the
//! outcome (`payment.processed` or `payment.failed`). Delivery is
//! at-least-once; a stable idempotency key derived from the reservation ID
//! keeps retries from double-charging.

pub mod config;
pub mod payment;
pub mod worker;
