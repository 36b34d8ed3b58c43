use std::sync::Arc;

use verifyflow_events::EventRelay;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Push-channel session manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Last-event cell and fan-out bus fed by the webhook receiver.
    pub relay: Arc<EventRelay>,
}

impl AppState {
    /// Build state with a fresh relay sized from `config`.
    pub fn new(config: ServerConfig) -> Self {
        let relay = Arc::new(EventRelay::new(config.relay_capacity));
        Self {
            config: Arc::new(config),
            ws_manager: Arc::new(WsManager::new()),
            relay,
        }
    }
}
