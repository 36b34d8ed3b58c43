use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a session.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single connected session.
pub struct WsConnection {
    /// Channel sender for outbound messages to this session.
    pub sender: WsSender,
    /// When this session connected.
    pub connected_at: DateTime<Utc>,
}

/// Manages every connected push-channel session.
///
/// Thread-safe via interior `RwLock`; wrapped in `Arc` and shared across
/// the application. The webhook receiver does not know which session owns
/// which job, so delivery is always a broadcast.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink. Re-using an ID replaces the
    /// previous registration.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            connected_at: Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a session by its ID.
    pub async fn remove(&self, conn_id: &str) {
        if let Some(conn) = self.connections.write().await.remove(conn_id) {
            let connected_for = Utc::now() - conn.connected_at;
            tracing::debug!(
                conn_id,
                connected_secs = connected_for.num_seconds(),
                "Push session removed"
            );
        }
    }

    /// Send a message to every connected session.
    ///
    /// Enqueueing never waits on the socket. Sessions whose channels are
    /// closed are skipped (they are removed when their receive loop ends).
    /// Returns the number of sessions the message was queued for.
    pub async fn broadcast(&self, message: Message) -> usize {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|conn| conn.sender.send(message.clone()).is_ok())
            .count()
    }

    /// Return the current number of connected sessions.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every session, then clear the map.
    ///
    /// Used during graceful shutdown so clients can reconnect elsewhere.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all push sessions");
    }

    /// Send a Ping frame to every connected session.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
