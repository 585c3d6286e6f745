//! Router configuration for the event service.

use crate::handlers::{self, AppState};
use axum::routing::{get, patch, post};
use axum::Router;
use tixie_web::health::{health_check, readiness_check};

/// Build the complete axum router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/v1", get(handlers::list_events).post(handlers::create_event))
        .route("/v1/:id", get(handlers::get_event))
        .route("/v1/:id/tickets", patch(handlers::purchase_tickets))
        .route("/v1/:id/reserve", post(handlers::reserve_ticket))
        .route(
            "/v1/:id/complete-reservation",
            post(handlers::complete_reservation),
        )
        .route(
            "/v1/:id/release-reservation",
            post(handlers::release_reservation),
        )
        .with_state(state)
}
