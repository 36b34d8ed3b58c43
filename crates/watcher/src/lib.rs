//! Session watcher runtime.
//!
//! Drives the [`SessionWatcher`](verifyflow_core::SessionWatcher) state
//! machine from a live relay connection:
//!
//! - [`Watcher`] — owns the state machine and at most one active
//!   subscription; exposes start, error, retry and stop for the host.
//! - [`WatchHandle`] — cancellable handle on the running subscription task.
//! - [`ConnectionHost`] — the surrounding application notified on completion.
//! - [`RelayClient`] — HTTP read endpoint and push-channel connection.

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod reconnect;
pub mod task;
pub mod watcher;

pub use client::RelayClient;
pub use config::{TransportKind, WatcherConfig};
pub use error::WatcherError;
pub use host::ConnectionHost;
pub use task::{WatchExit, WatchHandle};
pub use watcher::{StartOutcome, Watcher};
