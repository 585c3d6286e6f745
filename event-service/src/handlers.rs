//! HTTP handlers for the event service.

use crate::models::{CreateEventRequest, EventResponse, PurchaseRequest};
use crate::repo::EventRepository;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tixie_web::AppError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Inventory repository.
    pub repo: EventRepository,
}

/// Plain acknowledgement body for counter operations.
#[derive(Debug, Serialize)]
pub struct Ack {
    message: &'static str,
}

/// `POST /v1`: create an event.
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    request.validate().map_err(AppError::bad_request)?;

    let event = state.repo.create(&request).await?;
    tracing::info!(event_id = event.id, name = %event.name, "event created");
    Ok((StatusCode::CREATED, Json(event.into())))
}

/// `GET /v1`: list all events.
pub async fn list_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let events = state.repo.list().await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

/// `GET /v1/:id`: one event, including the derived `tickets_left`.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<EventResponse>, AppError> {
    let event = state.repo.get(event_id).await?;
    Ok(Json(event.into()))
}

/// `POST /v1/:id/reserve`: place a one-ticket hold.
pub async fn reserve_ticket(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<Ack>, AppError> {
    state.repo.reserve_ticket(event_id).await?;
    tracing::debug!(event_id, "ticket reserved");
    Ok(Json(Ack {
        message: "ticket reserved",
    }))
}

/// `POST /v1/:id/complete-reservation`: convert a hold into a sale.
pub async fn complete_reservation(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<Ack>, AppError> {
    state.repo.complete_reservation(event_id).await?;
    tracing::debug!(event_id, "reservation completed");
    Ok(Json(Ack {
        message: "reservation completed",
    }))
}

/// `POST /v1/:id/release-reservation`: drop a hold without selling.
pub async fn release_reservation(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<Ack>, AppError> {
    state.repo.release_reservation(event_id).await?;
    tracing::debug!(event_id, "reservation released");
    Ok(Json(Ack {
        message: "reservation released",
    }))
}

/// `PATCH /v1/:id/tickets`: bulk purchase.
pub async fn purchase_tickets(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<Ack>, AppError> {
    state
        .repo
        .update_tickets_sold(event_id, request.tickets)
        .await?;
    tracing::info!(event_id, tickets = request.tickets, "tickets sold");
    Ok(Json(Ack {
        message: "tickets sold",
    }))
}
