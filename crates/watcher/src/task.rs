//! The subscription task and its handle.
//!
//! One task per active wait. It feeds relayed events into the shared
//! [`SessionWatcher`] and exits as soon as the step completes, the wait is
//! abandoned, or the handle is cancelled. Exiting releases the push session
//! or stops the poll timer.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use verifyflow_core::{Completion, SessionWatcher, WebhookEvent};

use crate::client::RelayClient;
use crate::config::{TransportKind, WatcherConfig};
use crate::host::ConnectionHost;
use crate::reconnect::reconnect_loop;

pub(crate) type SharedSession = Arc<Mutex<SessionWatcher>>;

/// Why a subscription task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchExit {
    /// A matching event completed the step; the host was notified.
    Completed(Completion),
    /// The handle was cancelled (stop, retry or drop).
    Cancelled,
    /// The watcher left `AwaitingEvent` for another reason, e.g. an
    /// application error was reported.
    Abandoned,
}

// ---------------------------------------------------------------------------
// WatchHandle
// ---------------------------------------------------------------------------

/// Handle on a running subscription. Dropping it cancels the task.
#[derive(Debug)]
pub struct WatchHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<WatchExit>>,
}

impl WatchHandle {
    pub(crate) fn spawn<H: ConnectionHost>(
        config: Arc<WatcherConfig>,
        client: Arc<RelayClient>,
        session: SharedSession,
        host: Arc<H>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let ctx = WatchContext {
            config,
            client,
            session,
            host,
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(async move {
            match ctx.config.transport {
                TransportKind::Push => ctx.run_push().await,
                TransportKind::Poll => ctx.run_poll().await,
            }
        });

        Self {
            cancel,
            join: Some(join),
        }
    }

    /// Signal the task to stop. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the task to exit. `None` if it panicked.
    pub async fn join(mut self) -> Option<WatchExit> {
        let join = self.join.take()?;
        match join.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                tracing::error!(error = %e, "Watch task failed");
                None
            }
        }
    }

    /// Cancel and wait for the task to release its subscription.
    pub async fn shutdown(self) -> Option<WatchExit> {
        self.cancel();
        self.join().await
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Task body
// ---------------------------------------------------------------------------

struct WatchContext<H> {
    config: Arc<WatcherConfig>,
    client: Arc<RelayClient>,
    session: SharedSession,
    host: Arc<H>,
    cancel: CancellationToken,
}

impl<H: ConnectionHost> WatchContext<H> {
    async fn run_push(&self) -> WatchExit {
        loop {
            let Some(mut conn) =
                reconnect_loop(&self.client, &self.config.reconnect, &self.cancel).await
            else {
                return WatchExit::Cancelled;
            };

            // An event may have landed before the session opened.
            if let Some(exit) = self.recheck_latest().await {
                conn.close().await;
                return exit;
            }

            loop {
                let event = tokio::select! {
                    _ = self.cancel.cancelled() => {
                        conn.close().await;
                        return WatchExit::Cancelled;
                    }
                    event = conn.next_event() => event,
                };

                let Some(event) = event else {
                    tracing::info!("Push session ended, reconnecting");
                    break;
                };
                if let Some(exit) = self.feed(&event) {
                    conn.close().await;
                    return exit;
                }
            }
        }
    }

    async fn run_poll(&self) -> WatchExit {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return WatchExit::Cancelled,
                _ = interval.tick() => {}
            }

            if let Some(exit) = self.recheck_latest().await {
                return exit;
            }
        }
    }

    /// One read of the latest event. Read failures are logged and treated
    /// as "nothing yet"; the next poll or reconnect tries again.
    async fn recheck_latest(&self) -> Option<WatchExit> {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Some(WatchExit::Cancelled),
            result = self.client.latest() => result,
        };

        match result {
            Ok(Some(stored)) => self.feed(&stored.data),
            Ok(None) => self.still_awaiting(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read latest webhook event");
                self.still_awaiting()
            }
        }
    }

    /// Feed one event to the state machine. The host is notified outside
    /// the lock, at most once, because only one `observe` can complete.
    fn feed(&self, event: &WebhookEvent) -> Option<WatchExit> {
        let completion = {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            if !session.is_awaiting() {
                return Some(WatchExit::Abandoned);
            }
            session.observe(event)
        };

        let Some(completion) = completion else {
            tracing::debug!(
                event_type_id = %event.event_type_id,
                "Ignoring event that does not complete the step",
            );
            return None;
        };

        tracing::info!(
            job_id = %completion.job_id,
            event_type_id = %completion.event_type_id,
            "Verification step completed",
        );
        self.host.set_job_id(&completion.job_id);
        Some(WatchExit::Completed(completion))
    }

    fn still_awaiting(&self) -> Option<WatchExit> {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        (!session.is_awaiting()).then_some(WatchExit::Abandoned)
    }
}
