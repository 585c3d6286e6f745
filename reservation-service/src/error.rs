//! Reservation service errors and their HTTP mapping.

use thiserror::Error;
use tixie_breaker::BreakerError;
use tixie_web::AppError;

/// Errors from the reservation workflow.
#[derive(Error, Debug)]
pub enum ReservationError {
    /// Request failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// No reservation row with the requested ID.
    #[error("reservation not found")]
    NotFound,
    /// The reservation is completed or expired.
    #[error("reservation is no longer valid")]
    NoLongerPending,
    /// The reservation's hold has lapsed.
    #[error("reservation has expired")]
    Expired,
    /// The event has no sellable inventory left.
    #[error("no tickets available for this event")]
    NoTicketsAvailable,
    /// The event service refused to release: nothing is held. Benign for
    /// expiry retries.
    #[error("no reserved tickets")]
    NothingReserved,
    /// The event service misbehaved.
    #[error("event service error: {0}")]
    EventService(String),
    /// The user service misbehaved.
    #[error("user service error: {0}")]
    UserService(String),
    /// The ticket service misbehaved.
    #[error("ticket service error: {0}")]
    TicketService(String),
    /// The QR decoder misbehaved or the image held no code.
    #[error("qr decode error: {0}")]
    Qr(String),
    /// A dependency's breaker is open.
    #[error("service is temporarily unavailable")]
    Unavailable,
    /// A dependency's breaker shed the request in half-open.
    #[error("too many requests")]
    RateLimited,
    /// Database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<BreakerError<ReservationError>> for ReservationError {
    fn from(err: BreakerError<ReservationError>) -> Self {
        match err {
            BreakerError::Open => Self::Unavailable,
            BreakerError::TooManyRequests => Self::RateLimited,
            BreakerError::Inner(inner) => inner,
        }
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::InvalidInput(reason) => {
                Self::bad_request(format!("invalid input: {reason}"))
            }
            ReservationError::NotFound => Self::not_found("reservation not found"),
            ReservationError::NoLongerPending => Self::conflict("reservation is no longer valid"),
            ReservationError::Expired => Self::conflict("reservation has expired"),
            ReservationError::NoTicketsAvailable => {
                Self::conflict("no tickets available for this event")
            }
            ReservationError::NothingReserved => Self::conflict("no reserved tickets"),
            ReservationError::Unavailable => {
                Self::unavailable("Service is temporarily unavailable")
            }
            ReservationError::RateLimited => Self::too_many_requests("Too many requests"),
            ReservationError::EventService(reason) => {
                Self::internal(format!("failed to reach event service: {reason}"))
            }
            ReservationError::UserService(reason) => {
                Self::internal(format!("failed to reach user service: {reason}"))
            }
            ReservationError::TicketService(reason) => {
                Self::internal(format!("failed to reach ticket service: {reason}"))
            }
            ReservationError::Qr(reason) => Self::internal(format!("qr decode failed: {reason}")),
            ReservationError::Database(source) => {
                Self::internal("database error").with_source(source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn expired_reservation_is_a_conflict() {
        let app: AppError = ReservationError::Expired.into();
        assert_eq!(app.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn open_breaker_surfaces_as_retryable_503() {
        let err: ReservationError = BreakerError::<ReservationError>::Open.into();
        let app: AppError = err.into();
        assert_eq!(app.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(app.message(), "Service is temporarily unavailable");
    }
}
