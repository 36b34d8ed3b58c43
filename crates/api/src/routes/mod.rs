pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::webhook;
use crate::state::AppState;
use crate::ws;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /webhook                 POST  receive an aggregator callback
/// /webhook/latest          GET   last received event (poll sessions)
/// /ws                      GET   push channel (WebSocket upgrade)
/// ```
///
/// Other methods on these paths get `405 Method Not Allowed`.
pub fn api_routes(max_webhook_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/webhook",
            post(webhook::receive_webhook).layer(DefaultBodyLimit::max(max_webhook_bytes)),
        )
        .route("/webhook/latest", get(webhook::latest_event))
        .route("/ws", get(ws::ws_handler))
}
