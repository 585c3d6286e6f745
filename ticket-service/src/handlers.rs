//! HTTP handlers for the ticket service.

use crate::clients::{EventServiceClient, UserServiceClient};
use crate::config::Config;
use crate::models::{CreateTicketRequest, Ticket, TicketStatus, UpdateStatusRequest};
use crate::repo::TicketRepository;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tixie_broker::Broker;
use tixie_messages::{topics, LegacyEmailNotification};
use tixie_web::AppError;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Ticket records.
    pub repo: TicketRepository,
    /// Event existence and name lookups.
    pub events: EventServiceClient,
    /// User existence and email lookups.
    pub users: UserServiceClient,
    /// Bus handle; `None` disables publishing.
    pub broker: Option<Arc<Broker>>,
    /// Service configuration (WebSocket cadences).
    pub config: Arc<Config>,
    /// Root shutdown signal, observed by WebSocket tasks.
    pub shutdown: broadcast::Sender<()>,
}

/// Query string for `GET /v1`.
#[derive(Debug, Deserialize)]
pub struct TicketsQuery {
    /// Event to list tickets for.
    pub event_id: i32,
}

/// Verification view of a ticket, keyed the way scanners expect.
#[derive(Debug, Serialize)]
pub struct TicketVerification {
    /// Ticket record ID.
    pub ticket_id: i32,
    /// Event the ticket admits to.
    pub event_id: i32,
    /// Ticket holder.
    pub user_id: i32,
    /// Lifecycle status.
    pub status: TicketStatus,
}

/// One row of the events-with-tickets view, enriched with the event name.
#[derive(Debug, Serialize)]
pub struct EventView {
    /// Event ID.
    pub event_id: i32,
    /// Event name; empty when the event service could not answer.
    pub event_name: String,
    /// Tickets issued for the event.
    pub ticket_count: i64,
}

/// Body of the events-with-tickets view.
#[derive(Debug, Serialize)]
pub struct EventsBody {
    /// Enriched rows.
    pub events: Vec<EventView>,
}

/// `POST /v1`: create a ticket directly (no reservation).
pub async fn create_ticket(
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    if request.event_id <= 0 || request.user_id <= 0 {
        return Err(AppError::bad_request(
            "invalid input: event_id and user_id must be positive",
        ));
    }

    state.events.validate_event(request.event_id).await?;
    state.users.validate_user(request.user_id).await?;

    let ticket_code = Uuid::new_v4().to_string();
    let ticket = state
        .repo
        .create(request.event_id, request.user_id, &ticket_code, None)
        .await?;

    // Email delivery is best-effort on the direct path; this predates
    // ticket.issued and still publishes the legacy payload.
    if let Some(broker) = &state.broker {
        if let Some(email) = state.users.email(request.user_id).await {
            let message = LegacyEmailNotification {
                recipient_email: email,
                ticket_id: ticket.ticket_code.clone(),
            };
            if let Err(error) = broker
                .publish(&message, topics::NOTIFICATION_EMAIL_LEGACY)
                .await
            {
                tracing::warn!(ticket_id = ticket.id, error = %error, "failed to publish email notification");
            }
        }
    }

    tracing::info!(ticket_id = ticket.id, event_id = ticket.event_id, "ticket created");
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// `GET /v1/:id`: one ticket.
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<i32>,
) -> Result<Json<Ticket>, AppError> {
    let ticket = state.repo.get(ticket_id).await?;
    Ok(Json(ticket))
}

/// `GET /v1?event_id=`: tickets for an event.
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketsQuery>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    if query.event_id <= 0 {
        return Err(AppError::bad_request("invalid event ID"));
    }
    let tickets = state.repo.list_by_event(query.event_id).await?;
    Ok(Json(tickets))
}

/// `PUT /v1/:id/status`: gate check-in or refund.
pub async fn update_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<i32>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Ticket>, AppError> {
    let status: TicketStatus = request.status.parse().map_err(AppError::bad_request)?;

    let ticket = state.repo.get(ticket_id).await?;
    if !ticket.status.can_transition_to(status) {
        return Err(AppError::conflict(format!(
            "cannot move ticket from {} to {}",
            ticket.status, status
        )));
    }

    let updated = state.repo.update_status(ticket_id, status).await?;
    tracing::info!(ticket_id, status = %status, "ticket status updated");
    Ok(Json(updated))
}

/// `GET /v1/verify/:ticket_code`: verification lookup by code.
pub async fn get_by_code(
    State(state): State<AppState>,
    Path(ticket_code): Path<String>,
) -> Result<Json<TicketVerification>, AppError> {
    let normalized = ticket_code.trim().to_ascii_lowercase();
    let ticket = state.repo.get_by_code(&normalized).await?;
    Ok(Json(TicketVerification {
        ticket_id: ticket.id,
        event_id: ticket.event_id,
        user_id: ticket.user_id,
        status: ticket.status,
    }))
}

/// `GET /v1/events-with-tickets`: REST snapshot of the WebSocket view.
pub async fn events_with_tickets(
    State(state): State<AppState>,
) -> Result<Json<EventsBody>, AppError> {
    let events = events_with_tickets_view(&state).await?;
    Ok(Json(EventsBody { events }))
}

/// Shared snapshot source for the REST and WebSocket views: counts from the
/// local repository, names resolved best-effort from the event service.
pub async fn events_with_tickets_view(
    state: &AppState,
) -> Result<Vec<EventView>, crate::error::TicketError> {
    let rows = state.repo.events_with_tickets().await?;
    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        let event_name = state
            .events
            .event_name(row.event_id)
            .await
            .unwrap_or_default();
        events.push(EventView {
            event_id: row.event_id,
            event_name,
            ticket_count: row.ticket_count,
        });
    }
    Ok(events)
}
