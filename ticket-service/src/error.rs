//! Ticket service errors and their HTTP mapping.

use thiserror::Error;
use tixie_breaker::BreakerError;
use tixie_web::AppError;

/// Errors from ticket operations.
#[derive(Error, Debug)]
pub enum TicketError {
    /// No ticket with the requested ID or code.
    #[error("ticket not found")]
    NotFound,
    /// The freshly generated code collided with an existing one.
    #[error("ticket code already exists")]
    DuplicateCode,
    /// A ticket for this reservation already exists; the redelivery path.
    #[error("ticket already issued for this reservation")]
    AlreadyIssued,
    /// Status change on a ticket that is not `active`.
    #[error("ticket is not active")]
    NotActive,
    /// Request failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A sibling service misbehaved.
    #[error("{0}")]
    Upstream(String),
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

impl TicketError {
    /// Classify a database error, turning unique violations into their
    /// domain meaning instead of substring-matching message text.
    #[must_use]
    pub fn from_db(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &error {
            if db.is_unique_violation() {
                return if db.constraint() == Some("tickets_reservation_id_key") {
                    Self::AlreadyIssued
                } else {
                    Self::DuplicateCode
                };
            }
        }
        Self::Database(error)
    }
}

impl From<BreakerError<TicketError>> for TicketError {
    fn from(err: BreakerError<TicketError>) -> Self {
        match err {
            BreakerError::Open => Self::Unavailable,
            BreakerError::TooManyRequests => Self::RateLimited,
            BreakerError::Inner(inner) => inner,
        }
    }
}

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::NotFound => Self::not_found("ticket not found"),
            TicketError::DuplicateCode => Self::conflict("ticket code already exists"),
            TicketError::AlreadyIssued => {
                Self::conflict("ticket already issued for this reservation")
            }
            TicketError::NotActive => Self::conflict("ticket is not active"),
            TicketError::InvalidInput(reason) => Self::bad_request(reason),
            TicketError::Upstream(reason) => Self::internal(reason),
            TicketError::Unavailable => Self::unavailable("Service is temporarily unavailable"),
            TicketError::RateLimited => Self::too_many_requests("Too many requests"),
            TicketError::Database(source) => Self::internal("database error").with_source(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn duplicate_code_is_a_conflict() {
        let app: AppError = TicketError::DuplicateCode.into();
        assert_eq!(app.status(), StatusCode::CONFLICT);
        assert_eq!(app.message(), "ticket code already exists");
    }

    #[test]
    fn non_database_errors_pass_through_from_db() {
        let err = TicketError::from_db(sqlx::Error::RowNotFound);
        assert!(matches!(err, TicketError::Database(_)));
    }
}
