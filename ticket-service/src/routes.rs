//! Router configuration for the ticket service.

use crate::handlers::{self, AppState};
use crate::ws;
use axum::routing::{get, put};
use axum::Router;
use tixie_web::health::{health_check, readiness_check};

/// Build the complete axum router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/v1", get(handlers::list_tickets).post(handlers::create_ticket))
        .route("/v1/events-with-tickets", get(handlers::events_with_tickets))
        .route("/v1/verify/:ticket_code", get(handlers::get_by_code))
        .route("/v1/ws/events-with-tickets", get(ws::events_with_tickets))
        .route("/v1/ws/tickets/:event_id", get(ws::tickets_by_event))
        .route("/v1/:id", get(handlers::get_ticket))
        .route("/v1/:id/status", put(handlers::update_status))
        .with_state(state)
}
