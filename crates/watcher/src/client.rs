//! Client side of the relay: the latest-event read endpoint over HTTP and
//! the push channel over WebSocket.

use std::time::Duration;

use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use verifyflow_core::{PushFrame, StoredEvent, WebhookEvent};

use crate::config::WatcherConfig;
use crate::error::WatcherError;

/// Upper bound on waiting for the relay's close reply.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection handle for one relay.
pub struct RelayClient {
    http: reqwest::Client,
    latest_url: String,
    ws_url: String,
}

impl RelayClient {
    pub fn new(config: &WatcherConfig) -> Result<Self, WatcherError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            latest_url: config.latest_url(),
            ws_url: config.ws_url.clone(),
        })
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Read the most recent event, or `None` before any event arrived.
    pub async fn latest(&self) -> Result<Option<StoredEvent>, WatcherError> {
        let body: serde_json::Value = self
            .http
            .get(&self.latest_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(parse_latest(body))
    }

    /// Open a push session.
    pub async fn connect(&self) -> Result<PushConnection, WatcherError> {
        let (stream, _response) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| {
                WatcherError::Connection(format!(
                    "Failed to connect to relay at {}: {e}",
                    self.ws_url
                ))
            })?;

        tracing::debug!(ws_url = %self.ws_url, "Push session opened");
        Ok(PushConnection { stream })
    }
}

/// The read endpoint returns either a stored event or a sentinel message.
fn parse_latest(body: serde_json::Value) -> Option<StoredEvent> {
    if body.get("data").is_none() {
        return None;
    }
    match serde_json::from_value(body) {
        Ok(stored) => Some(stored),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed latest-event response");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Push session
// ---------------------------------------------------------------------------

/// A live push session.
pub struct PushConnection {
    stream: WsStream,
}

impl PushConnection {
    /// Wait for the next relayed event.
    ///
    /// Frames other than `webhookEvent` are skipped. Returns `None` once
    /// the session has ended, whether closed by the server or broken.
    pub async fn next_event(&mut self) -> Option<WebhookEvent> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    if let Some(event) = decode_frame(&text) {
                        return Some(event);
                    }
                }
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "Push session closed by relay");
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Push session error");
                    return None;
                }
            }
        }
    }

    /// Close the session and wait briefly for the relay to answer the close
    /// handshake. Errors are ignored; the socket is dropped either way.
    pub async fn close(mut self) {
        if self.stream.close(None).await.is_err() {
            return;
        }
        let drain = async { while let Some(Ok(_)) = self.stream.next().await {} };
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, drain).await;
    }
}

fn decode_frame(text: &str) -> Option<WebhookEvent> {
    match serde_json::from_str::<PushFrame>(text) {
        Ok(frame) if frame.is_webhook_event() => Some(frame.data),
        Ok(frame) => {
            tracing::debug!(event = %frame.event, "Skipping unrelated push frame");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "Skipping undecodable push frame");
            None
        }
    }
}
