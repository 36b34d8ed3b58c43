//! Watcher configuration.
//!
//! Loaded from environment variables; every value has a default suitable
//! for a relay running on the same host.

use std::time::Duration;

use verifyflow_core::TRANSACTIONS_UPDATED;

use crate::error::WatcherError;
use crate::reconnect::ReconnectConfig;

/// Default poll cadence when the push channel is not used.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Path of the push channel, relative to the relay's base URL.
const PUSH_PATH: &str = "/api/ws";

/// How the watcher learns about new events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Persistent push session; re-checks the read endpoint on every
    /// (re)connect to catch events that arrived while disconnected.
    Push,
    /// Periodic reads of the latest-event endpoint.
    Poll,
}

impl std::str::FromStr for TransportKind {
    type Err = WatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" | "ws" | "websocket" => Ok(Self::Push),
            "poll" | "http" => Ok(Self::Poll),
            other => Err(WatcherError::Config(format!(
                "RELAY_TRANSPORT must be 'push' or 'poll', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Base URL of the relay's HTTP endpoints, e.g. `http://localhost:3000`.
    pub http_base: String,
    /// Full URL of the push channel, e.g. `ws://localhost:3000/api/ws`.
    pub ws_url: String,
    pub transport: TransportKind,
    pub poll_interval: Duration,
    /// Event type that completes the step.
    pub expected_event_type: String,
    /// Timeout applied to each HTTP read.
    pub request_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl WatcherConfig {
    /// Push-mode configuration for a relay at `http_base`.
    pub fn push(http_base: impl Into<String>) -> Self {
        let http_base = trim_base(http_base.into());
        Self {
            ws_url: derive_ws_url(&http_base),
            http_base,
            transport: TransportKind::Push,
            poll_interval: DEFAULT_POLL_INTERVAL,
            expected_event_type: TRANSACTIONS_UPDATED.to_string(),
            request_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Poll-mode configuration for a relay at `http_base`.
    pub fn poll(http_base: impl Into<String>, interval: Duration) -> Self {
        Self {
            transport: TransportKind::Poll,
            poll_interval: interval,
            ..Self::push(http_base)
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env var               | Default                          |
    /// |-----------------------|----------------------------------|
    /// | `RELAY_HTTP_URL`      | `http://localhost:3000`          |
    /// | `RELAY_WS_URL`        | derived from `RELAY_HTTP_URL`    |
    /// | `RELAY_TRANSPORT`     | `push`                           |
    /// | `POLL_INTERVAL_MS`    | `3000`                           |
    /// | `EXPECTED_EVENT_TYPE` | `transactions.updated`           |
    pub fn from_env() -> Result<Self, WatcherError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WatcherError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_base =
            lookup("RELAY_HTTP_URL").unwrap_or_else(|| "http://localhost:3000".to_string());
        let mut config = Self::push(http_base);

        if let Some(ws_url) = lookup("RELAY_WS_URL") {
            config.ws_url = ws_url;
        }
        if let Some(transport) = lookup("RELAY_TRANSPORT") {
            config.transport = transport.parse()?;
        }
        if let Some(ms) = lookup("POLL_INTERVAL_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                WatcherError::Config(format!("POLL_INTERVAL_MS must be an integer, got '{ms}'"))
            })?;
            if ms == 0 {
                return Err(WatcherError::Config(
                    "POLL_INTERVAL_MS must be greater than zero".to_string(),
                ));
            }
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(event_type) = lookup("EXPECTED_EVENT_TYPE") {
            config.expected_event_type = event_type;
        }

        Ok(config)
    }

    /// URL of the latest-event read endpoint.
    pub fn latest_url(&self) -> String {
        format!("{}/api/webhook/latest", self.http_base)
    }
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}

/// `http://host` -> `ws://host/api/ws`, `https://host` -> `wss://host/api/ws`.
fn derive_ws_url(http_base: &str) -> String {
    let base = if let Some(rest) = http_base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        http_base.to_string()
    };
    format!("{base}{PUSH_PATH}")
}
