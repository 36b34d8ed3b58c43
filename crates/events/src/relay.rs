//! In-process relay backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventRelay`] is the single owner of relay state. It is created at
//! startup, shared as `Arc<EventRelay>` with the webhook receiver and the
//! read/subscribe paths, and torn down with [`EventRelay::shutdown`].
//! Nothing here is durable: a restart drops the stored event and every
//! subscription.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use verifyflow_core::{StoredEvent, WebhookEvent};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Errors and receipts
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The relay was shut down; nothing is recorded or broadcast.
    #[error("Event relay is closed")]
    Closed,
}

/// What happened to a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayReceipt {
    /// Receipt time stored alongside the event.
    pub timestamp: DateTime<Utc>,
    /// Number of live subscriptions the event was queued for.
    pub subscribers: usize,
}

// ---------------------------------------------------------------------------
// EventRelay
// ---------------------------------------------------------------------------

struct RelayInner {
    latest: Option<StoredEvent>,
    sender: Option<broadcast::Sender<WebhookEvent>>,
}

/// Last-event cell plus fan-out bus behind one lock.
///
/// Publishing takes the write lock for the whole record-then-broadcast
/// step, so concurrent deliveries cannot interleave and the stored event
/// always matches the most recent broadcast.
pub struct EventRelay {
    inner: RwLock<RelayInner>,
}

impl EventRelay {
    /// Create a relay with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed events are dropped
    /// and slow subscribers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: RwLock::new(RelayInner {
                latest: None,
                sender: Some(sender),
            }),
        }
    }

    /// Record `event` as the latest and broadcast it once to every current
    /// subscriber.
    ///
    /// Never waits on subscribers. With zero subscribers the event is still
    /// recorded for pollers.
    pub fn publish(&self, event: WebhookEvent) -> Result<RelayReceipt, RelayError> {
        let mut inner = self.write();
        let Some(sender) = inner.sender.clone() else {
            return Err(RelayError::Closed);
        };

        let stored = StoredEvent::received_now(event.clone());
        let timestamp = stored.timestamp;
        inner.latest = Some(stored);

        // A send error only means there are zero receivers.
        let subscribers = sender.send(event).unwrap_or(0);
        if subscribers == 0 {
            tracing::debug!("Relayed event has no live subscribers");
        }

        Ok(RelayReceipt {
            timestamp,
            subscribers,
        })
    }

    /// The most recently published event, if any.
    pub fn latest(&self) -> Option<StoredEvent> {
        self.read().latest.clone()
    }

    /// Subscribe to every event published from now on.
    pub fn subscribe(&self) -> Result<broadcast::Receiver<WebhookEvent>, RelayError> {
        self.read()
            .sender
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(RelayError::Closed)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.read()
            .sender
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    pub fn is_closed(&self) -> bool {
        self.read().sender.is_none()
    }

    /// Drop the bus sender. Existing subscribers drain what is buffered and
    /// then observe the channel closing.
    pub fn shutdown(&self) {
        if self.write().sender.take().is_some() {
            tracing::info!("Event relay shut down");
        }
    }

    // The guarded data is plain values, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, RelayInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RelayInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
