//! Background tasks that run alongside the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::state::AppState;
use crate::ws::{self, RelayFanout};

/// Handles to the relay fan-out and heartbeat tasks.
pub struct RelayServices {
    fanout: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl RelayServices {
    /// Subscribe the fan-out to the relay and start the heartbeat.
    ///
    /// If the relay is already closed the fan-out exits immediately and
    /// events are only available through the read endpoint.
    pub fn start(state: &AppState) -> Self {
        let fanout = match state.relay.subscribe() {
            Ok(receiver) => {
                let fanout = RelayFanout::new(Arc::clone(&state.ws_manager));
                tokio::spawn(fanout.run(receiver))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Relay fan-out not started");
                tokio::spawn(async {})
            }
        };
        let heartbeat = ws::start_heartbeat(Arc::clone(&state.ws_manager));

        Self { fanout, heartbeat }
    }

    /// Tear down in dependency order: close the relay so the fan-out
    /// drains and exits, close every session, then stop the heartbeat.
    pub async fn shutdown(self, state: &AppState, grace: Duration) {
        state.relay.shutdown();
        if tokio::time::timeout(grace, self.fanout).await.is_err() {
            tracing::warn!("Relay fan-out did not stop within the grace period");
        }

        let ws_count = state.ws_manager.connection_count().await;
        tracing::info!(ws_count, "Closing remaining push sessions");
        state.ws_manager.shutdown_all().await;

        self.heartbeat.abort();
        tracing::info!("Heartbeat task stopped");
    }
}
