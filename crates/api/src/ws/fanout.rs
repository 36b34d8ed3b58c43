//! Relay-to-session fan-out.
//!
//! [`RelayFanout`] subscribes to the [`EventRelay`](verifyflow_events::EventRelay)
//! bus and pushes every event to all connected sessions as a named
//! `webhookEvent` message. Running the fan-out on its own task keeps the
//! webhook receiver's acknowledgement independent of socket speed.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::broadcast;
use verifyflow_core::{PushFrame, WebhookEvent};

use crate::ws::WsManager;

pub struct RelayFanout {
    ws_manager: Arc<WsManager>,
}

impl RelayFanout {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the fan-out loop.
    ///
    /// Exits when the relay bus closes (i.e. the relay is shut down).
    pub async fn run(self, mut receiver: broadcast::Receiver<WebhookEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.deliver(event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Relay fan-out lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event relay closed, fan-out shutting down");
                    break;
                }
            }
        }
    }

    async fn deliver(&self, event: WebhookEvent) {
        let event_type_id = event.event_type_id.clone();
        let frame = match serde_json::to_string(&PushFrame::webhook_event(event)) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    event_type_id = %event_type_id,
                    "Failed to encode push frame"
                );
                return;
            }
        };

        let sessions = self.ws_manager.broadcast(Message::Text(frame.into())).await;
        tracing::debug!(
            event_type_id = %event_type_id,
            sessions,
            "Relayed event to push sessions"
        );
    }
}
