//! Liveness and readiness endpoints mounted by every service.

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
}

/// Liveness probe: the process is up and serving.
pub async fn health_check() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Readiness probe. Services that need dependency checks mount their own;
/// this default just reports the process as ready.
pub async fn readiness_check() -> (StatusCode, Json<Health>) {
    (StatusCode::OK, Json(Health { status: "ready" }))
}
