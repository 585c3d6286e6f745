//! HTTP handlers for the reservation service.

use crate::clients::{EventServiceClient, TicketServiceClient, UserServiceClient};
use crate::error::ReservationError;
use crate::expiry::Expirer;
use crate::models::{CompleteRequest, Reservation, ReservationStatus, ReserveRequest};
use crate::qr::{self, QrClient};
use crate::repo::ReservationRepository;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tixie_broker::Broker;
use tixie_messages::{topics, ReservationCompleted, ReservationCreated};
use tixie_web::AppError;

/// Shared handler state; everything is constructed in `main` and injected.
#[derive(Clone)]
pub struct AppState {
    /// Reservation records.
    pub repo: ReservationRepository,
    /// Inventory authority.
    pub events: EventServiceClient,
    /// User existence checks.
    pub users: UserServiceClient,
    /// Ticket lookups for verification.
    pub tickets: TicketServiceClient,
    /// External QR decoder.
    pub qr: QrClient,
    /// Timer and sweeper machinery.
    pub expirer: Expirer,
    /// Bus handle; `None` disables publishing.
    pub broker: Option<Arc<Broker>>,
}

/// Body returned by `POST /v1`.
#[derive(Debug, Serialize)]
pub struct ReserveResponse {
    /// Created reservation ID.
    pub reservation_id: i32,
    /// Event held against.
    pub event_id: i32,
    /// Per-ticket price at reservation time.
    pub price: Decimal,
    /// Buyer.
    pub user_id: i32,
    /// Always `pending` on creation.
    pub status: ReservationStatus,
    /// When the hold lapses.
    pub expiration_time: DateTime<Utc>,
}

/// Body returned by `POST /v1/complete`.
#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    /// Completed reservation.
    pub reservation_id: i32,
    /// Event sold against.
    pub event_id: i32,
    /// Buyer being charged.
    pub user_id: i32,
    /// Charge amount in cents.
    pub amount_cents: i64,
}

/// Body returned by `GET /v1/cleanup`.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    /// Always "cleanup completed".
    pub message: &'static str,
    /// Reservations expired this run.
    pub processed: usize,
    /// Expired-but-pending reservations found.
    pub total: usize,
}

#[derive(Debug, Serialize)]
struct VerifyOk {
    valid: bool,
    ticket_id: i32,
    event_id: i32,
    user_id: i32,
}

#[derive(Debug, Serialize)]
struct VerifyFail {
    valid: bool,
    error: String,
}

fn amount_cents(price: Decimal) -> Option<i64> {
    (price * Decimal::from(100)).round().to_i64()
}

/// `POST /v1`: place a hold on one ticket.
///
/// Steps after the inventory decrement compensate with a release on any
/// failure, so an aborted request never strands a hold.
pub async fn reserve(
    State(state): State<AppState>,
    Json(request): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<ReserveResponse>), AppError> {
    if request.event_id <= 0 || request.user_id <= 0 {
        return Err(AppError::bad_request(
            "invalid input: event_id and user_id must be positive",
        ));
    }

    // Step 1: fetch the event; fail fast when sold out.
    let event = state.events.get_event(request.event_id).await?;
    if event.tickets_left <= 0 {
        return Err(AppError::conflict("no tickets available for this event"));
    }

    // Step 2: place the hold. The event service does the atomic decrement.
    state.events.reserve(request.event_id).await?;

    // Step 3: the buyer must exist.
    if let Err(error) = state.users.verify_user(request.user_id).await {
        release_quietly(&state.events, request.event_id).await;
        return Err(error.into());
    }

    // Step 4: persist the reservation locally.
    let reservation = match state
        .repo
        .create(request.event_id, request.user_id, event.reservation_timeout)
        .await
    {
        Ok(reservation) => reservation,
        Err(error) => {
            release_quietly(&state.events, request.event_id).await;
            return Err(error.into());
        }
    };

    // Step 5: arm the single-shot expiry timer.
    state.expirer.schedule(&reservation);

    // Step 6: audit publish, best-effort.
    if let Some(broker) = &state.broker {
        let message = ReservationCreated {
            reservation_id: reservation.id,
            event_id: reservation.event_id,
            user_id: reservation.user_id,
            expiration_time: reservation.expiration_time.timestamp(),
        };
        if let Err(error) = broker.publish(&message, topics::RESERVATION_CREATED).await {
            tracing::warn!(
                reservation_id = reservation.id,
                error = %error,
                "failed to publish reservation.created"
            );
        }
    }

    tracing::info!(
        reservation_id = reservation.id,
        event_id = reservation.event_id,
        user_id = reservation.user_id,
        "reservation created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ReserveResponse {
            reservation_id: reservation.id,
            event_id: reservation.event_id,
            price: event.price,
            user_id: reservation.user_id,
            status: reservation.status,
            expiration_time: reservation.expiration_time,
        }),
    ))
}

/// `POST /v1/complete`: buyer confirms intent to pay.
pub async fn complete(
    State(state): State<AppState>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, AppError> {
    if request.reservation_id <= 0 {
        return Err(AppError::bad_request(
            "invalid input: reservation_id must be positive",
        ));
    }

    let reservation = state.repo.get(request.reservation_id).await?;
    if reservation.status != ReservationStatus::Pending {
        return Err(ReservationError::NoLongerPending.into());
    }
    if reservation.expiration_time <= Utc::now() {
        return Err(ReservationError::Expired.into());
    }

    // Convert the hold into a sale under the event row lock.
    state
        .events
        .complete_reservation(reservation.event_id)
        .await?;

    // Re-read for the authoritative price.
    let event = state.events.get_event(reservation.event_id).await?;
    let amount = amount_cents(event.price)
        .ok_or_else(|| AppError::internal("event price out of range"))?;

    // The sale already happened on the event side; a failure to flip the
    // local row is logged and tolerated rather than unwound.
    match state.repo.complete(reservation.id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(
                reservation_id = reservation.id,
                "reservation no longer pending while completing"
            );
        }
        Err(error) => {
            tracing::warn!(
                reservation_id = reservation.id,
                error = %error,
                "failed to mark reservation completed"
            );
        }
    }

    // Hand off to payment processing.
    if let Some(broker) = &state.broker {
        let message = ReservationCompleted {
            reservation_id: reservation.id,
            event_id: reservation.event_id,
            user_id: reservation.user_id,
            amount,
        };
        if let Err(error) = broker
            .publish(&message, topics::RESERVATION_COMPLETED)
            .await
        {
            tracing::error!(
                reservation_id = reservation.id,
                error = %error,
                "failed to publish reservation.completed"
            );
        }
    }

    tracing::info!(
        reservation_id = reservation.id,
        amount_cents = amount,
        "reservation completed"
    );

    Ok(Json(CompleteResponse {
        reservation_id: reservation.id,
        event_id: reservation.event_id,
        user_id: reservation.user_id,
        amount_cents: amount,
    }))
}

/// `GET /v1/:id`: one reservation.
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<i32>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state.repo.get(reservation_id).await?;
    Ok(Json(reservation))
}

/// `POST /v1/verify`: verify a ticket from a QR image or URL.
///
/// Accepts a multipart form with either a `file` image upload or a `url`
/// field pointing at one.
pub async fn verify(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut qr_data: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("failed to parse form: {e}")))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(format!("failed to read file: {e}")))?;
                qr_data = Some(state.qr.decode_image(bytes.to_vec()).await?);
                break;
            }
            Some("url") => {
                let url = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(format!("failed to read url: {e}")))?;
                qr_data = Some(state.qr.decode_url(&url).await?);
                break;
            }
            _ => {}
        }
    }

    let qr_data = qr_data.ok_or_else(|| AppError::bad_request("no file or url provided"))?;
    let code = qr::extract_ticket_code(&qr_data)
        .ok_or_else(|| AppError::bad_request("invalid ticket code format"))?;

    let Some(ticket) = state.tickets.get_by_code(&code).await? else {
        return Ok(verify_failure("ticket not found"));
    };
    if ticket.status != "active" {
        return Ok(verify_failure("ticket is not active"));
    }

    tracing::info!(ticket_id = ticket.ticket_id, "ticket verified");
    Ok((
        StatusCode::OK,
        Json(VerifyOk {
            valid: true,
            ticket_id: ticket.ticket_id,
            event_id: ticket.event_id,
            user_id: ticket.user_id,
        }),
    )
        .into_response())
}

fn verify_failure(reason: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(VerifyFail {
            valid: false,
            error: reason.to_string(),
        }),
    )
        .into_response()
}

/// `GET /v1/cleanup`: run one sweep immediately.
pub async fn cleanup(State(state): State<AppState>) -> Result<Json<CleanupResponse>, AppError> {
    let summary = state.expirer.sweep().await?;
    Ok(Json(CleanupResponse {
        message: "cleanup completed",
        processed: summary.processed,
        total: summary.total,
    }))
}

async fn release_quietly(events: &EventServiceClient, event_id: i32) {
    if let Err(error) = events.release_reservation(event_id).await {
        tracing::error!(
            event_id,
            error = %error,
            "failed to release hold while compensating"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_converts_to_cents() {
        assert_eq!(amount_cents(Decimal::new(2500, 2)), Some(2500)); // 25.00
        assert_eq!(amount_cents(Decimal::new(1999, 2)), Some(1999)); // 19.99
        assert_eq!(amount_cents(Decimal::ZERO), Some(0));
    }
}
