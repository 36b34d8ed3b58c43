//! Push channel for connected browser sessions.
//!
//! Provides connection management, heartbeat monitoring, relay fan-out and
//! the HTTP upgrade handler used by Axum routes.

pub mod fanout;
mod handler;
mod heartbeat;
pub mod manager;

pub use fanout::RelayFanout;
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
