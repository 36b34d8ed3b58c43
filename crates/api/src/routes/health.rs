use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the relay still accepts events.
    pub relay_open: bool,
    /// Connected push sessions.
    pub sessions: usize,
}

/// GET /health -- returns service and relay health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let relay_open = !state.relay.is_closed();
    let status = if relay_open { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        relay_open,
        sessions: state.ws_manager.connection_count().await,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
