//! Event service errors and their HTTP mapping.

use thiserror::Error;
use tixie_breaker::BreakerError;
use tixie_web::AppError;

/// Errors from inventory and event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// No event row with the requested ID.
    #[error("event not found")]
    NotFound,
    /// `total - sold - reserved` has hit zero.
    #[error("no tickets available")]
    NoTicketsAvailable,
    /// A reserved-ticket operation with nothing reserved.
    #[error("no reserved tickets")]
    NothingReserved,
    /// Bulk purchase rejected.
    #[error("{0}")]
    InvalidPurchase(String),
    /// The repository breaker is open.
    #[error("service is temporarily unavailable")]
    Unavailable,
    /// The repository breaker shed the request in half-open.
    #[error("too many requests")]
    RateLimited,
    /// Database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<BreakerError<EventError>> for EventError {
    fn from(err: BreakerError<EventError>) -> Self {
        match err {
            BreakerError::Open => Self::Unavailable,
            BreakerError::TooManyRequests => Self::RateLimited,
            BreakerError::Inner(inner) => inner,
        }
    }
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::NotFound => Self::not_found("event not found"),
            EventError::NoTicketsAvailable => Self::conflict("no tickets available"),
            EventError::NothingReserved => Self::conflict("no reserved tickets"),
            EventError::InvalidPurchase(reason) => Self::bad_request(reason),
            EventError::Unavailable => Self::unavailable("Service is temporarily unavailable"),
            EventError::RateLimited => Self::too_many_requests("Too many requests"),
            EventError::Database(source) => {
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
    fn exhausted_inventory_is_a_conflict() {
        let app: AppError = EventError::NoTicketsAvailable.into();
        assert_eq!(app.status(), StatusCode::CONFLICT);
        assert_eq!(app.message(), "no tickets available");
    }

    #[test]
    fn breaker_rejections_flatten_to_retryable_errors() {
        let err: EventError = BreakerError::<EventError>::Open.into();
        assert!(matches!(err, EventError::Unavailable));

        let err: EventError = BreakerError::<EventError>::TooManyRequests.into();
        assert!(matches!(err, EventError::RateLimited));
    }
}
