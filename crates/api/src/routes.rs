//! Route tables.
//!
//! Health stays at the root; triggers live under `/api/v1`; the provider
//! webhook gets its own top-level prefix so it can sit behind a separate
//! ingress rule than the user-facing API.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::handlers;
use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
}

/// GET /health -- returns service and database health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = docureel_db::health_check(&state.pool).await.is_ok();

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
    })
}

/// Mount health check routes (root-level, NOT under `/api/v1`).
pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Mount the provider webhook routes (root-level, under `/webhooks`).
pub fn webhook_router() -> Router<AppState> {
    Router::new().route("/webhooks/avatar", post(handlers::webhook::avatar_webhook))
}

/// Mount the `/api/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/process",
            post(handlers::pipeline::start_processing),
        )
        .route(
            "/projects/{project_id}/compose",
            post(handlers::pipeline::request_composition),
        )
}
