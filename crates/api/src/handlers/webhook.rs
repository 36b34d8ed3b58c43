//! Webhook receiver and poll read endpoint.
//!
//! The aggregator calls the receiver when a job changes state. Each valid
//! callback is recorded as the latest event and broadcast once to every
//! push session. The receiver does not authenticate the sender and does
//! not deduplicate retries; sessions deduplicate on their side.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use verifyflow_core::{StoredEvent, WebhookEvent};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Sentinel returned by the read endpoint before any webhook arrived.
pub const NO_WEBHOOK_DATA: &str = "No webhook data received yet";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Acknowledgement sent back to the aggregator.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub received: bool,
    pub data: WebhookEvent,
}

/// Body of `GET /api/webhook/latest`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LatestEventResponse {
    Event(StoredEvent),
    Empty { message: &'static str },
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/webhook
///
/// Accept one callback. Relay failures are logged and still acknowledged
/// so the aggregator does not retry a delivery that was received.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    ensure_json_content_type(&headers)?;

    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?;
    let event = WebhookEvent::from_value(value)?;

    tracing::info!(
        event_type_id = %event.event_type_id,
        job_id = event.job_id().unwrap_or("-"),
        "Received webhook event",
    );

    match state.relay.publish(event.clone()) {
        Ok(receipt) => {
            tracing::debug!(
                subscribers = receipt.subscribers,
                timestamp = %receipt.timestamp,
                "Webhook event relayed",
            );
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                event_type_id = %event.event_type_id,
                "Relay unavailable, event not broadcast",
            );
        }
    }

    Ok(Json(WebhookAck {
        success: true,
        received: true,
        data: event,
    }))
}

/// GET /api/webhook/latest
///
/// Return the most recent event with its receipt time, or a sentinel
/// message when nothing has been received since startup.
pub async fn latest_event(State(state): State<AppState>) -> Json<LatestEventResponse> {
    Json(match state.relay.latest() {
        Some(stored) => LatestEventResponse::Event(stored),
        None => LatestEventResponse::Empty {
            message: NO_WEBHOOK_DATA,
        },
    })
}

/// Require `application/json` (parameters such as `charset` allowed) or a
/// `+json` structured-syntax type.
fn ensure_json_content_type(headers: &HeaderMap) -> AppResult<()> {
    let Some(content_type) = headers.get(CONTENT_TYPE) else {
        return Err(AppError::UnsupportedMediaType(
            "Expected Content-Type: application/json".to_string(),
        ));
    };

    let essence = content_type
        .to_str()
        .unwrap_or_default()
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "application/json" || essence.ends_with("+json") {
        Ok(())
    } else {
        Err(AppError::UnsupportedMediaType(format!(
            "Expected Content-Type: application/json, got '{essence}'"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
