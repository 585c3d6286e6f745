//! Router configuration for the reservation service.

use crate::handlers::{self, AppState};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tixie_web::health::{health_check, readiness_check};

/// Uploaded QR images are small; anything bigger is abuse.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Build the complete axum router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/v1", post(handlers::reserve))
        .route("/v1/complete", post(handlers::complete))
        .route("/v1/verify", post(handlers::verify))
        .route("/v1/cleanup", get(handlers::cleanup))
        .route("/v1/:id", get(handlers::get_reservation))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
