//! Event relay between the webhook receiver and connected sessions.
//!
//! - [`EventRelay`] — lock-guarded last-event cell plus an in-process
//!   fan-out bus backed by `tokio::sync::broadcast`.
//! - [`RelayError`] — the soft failures callers log and move past.

pub mod relay;

pub use relay::{EventRelay, RelayError, RelayReceipt};
