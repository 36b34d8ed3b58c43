//! Domain types for the verification-step completion relay.
//!
//! Everything here is free of I/O so the receiver, the relay and the
//! session watcher runtime can share one definition of what a job, an
//! event and a completion are.

pub mod error;
pub mod event;
pub mod job_id;
pub mod watcher;

pub use error::CoreError;
pub use event::{PushFrame, StoredEvent, WebhookEvent, TRANSACTIONS_UPDATED, WEBHOOK_EVENT_FRAME};
pub use job_id::JobId;
pub use watcher::{BeginOutcome, Completion, SessionWatcher, WatcherState};
