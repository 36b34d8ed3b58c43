//! Host-facing watcher.
//!
//! [`Watcher`] owns the [`SessionWatcher`] state machine for one page load
//! and at most one subscription task. A retry waits for the previous task
//! to exit before the next one is spawned, so two subscriptions never
//! overlap.

use std::sync::{Arc, Mutex, PoisonError};

use verifyflow_core::{BeginOutcome, JobId, SessionWatcher, WatcherState};

use crate::client::RelayClient;
use crate::config::WatcherConfig;
use crate::error::WatcherError;
use crate::host::ConnectionHost;
use crate::task::{SharedSession, WatchExit, WatchHandle};

/// Result of [`Watcher::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Subscribed; waiting for the job's completion event.
    Watching(JobId),
    /// No job identifier; the host was warned and nothing was subscribed.
    MissingJobId,
}

pub struct Watcher<H: ConnectionHost> {
    config: Arc<WatcherConfig>,
    client: Arc<RelayClient>,
    host: Arc<H>,
    session: SharedSession,
    active: Option<WatchHandle>,
}

impl<H: ConnectionHost> Watcher<H> {
    pub fn new(config: WatcherConfig, host: Arc<H>) -> Result<Self, WatcherError> {
        let client = RelayClient::new(&config)?;
        let session = SessionWatcher::new(config.expected_event_type.clone());

        Ok(Self {
            config: Arc::new(config),
            client: Arc::new(client),
            host,
            session: Arc::new(Mutex::new(session)),
            active: None,
        })
    }

    /// Begin waiting for `job_id`.
    ///
    /// Must be called from within a Tokio runtime. Only valid while idle;
    /// use [`retry`](Self::retry) after a failure.
    pub fn start(&mut self, job_id: Option<JobId>) -> Result<StartOutcome, WatcherError> {
        let outcome = self.lock().begin(job_id)?;
        self.release();
        match outcome {
            BeginOutcome::MissingJobId => {
                self.host.on_missing_job_id();
                Ok(StartOutcome::MissingJobId)
            }
            BeginOutcome::Awaiting(job_id) => {
                tracing::info!(
                    job_id = %job_id,
                    transport = ?self.config.transport,
                    "Waiting for completion event",
                );
                self.active = Some(WatchHandle::spawn(
                    Arc::clone(&self.config),
                    Arc::clone(&self.client),
                    Arc::clone(&self.session),
                    Arc::clone(&self.host),
                ));
                Ok(StartOutcome::Watching(job_id))
            }
        }
    }

    /// Record an application error reported by the host and signal the
    /// subscription to stop. Returns `false` if the step was already
    /// terminal.
    pub fn report_error(&mut self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let failed = self.lock().fail(reason.clone());
        if failed {
            tracing::warn!(reason = %reason, "Verification step failed");
            if let Some(handle) = &self.active {
                handle.cancel();
            }
        }
        failed
    }

    /// Restart the wait after a failure.
    ///
    /// The old subscription is cancelled and has fully exited, releasing
    /// its push session or poll timer, before the new one is created.
    pub async fn retry(&mut self, job_id: Option<JobId>) -> Result<StartOutcome, WatcherError> {
        if self.can_retry() {
            if let Some(handle) = self.active.take() {
                handle.shutdown().await;
            }
        }
        self.lock().retry()?;
        tracing::info!("Retrying verification step");
        self.start(job_id)
    }

    /// Tear down the subscription and wait until it is released.
    pub async fn stop(&mut self) -> Option<WatchExit> {
        let handle = self.active.take()?;
        handle.shutdown().await
    }

    /// Wait for the active subscription to end on its own.
    pub async fn wait(&mut self) -> Option<WatchExit> {
        let handle = self.active.take()?;
        handle.join().await
    }

    pub fn state(&self) -> WatcherState {
        self.lock().state().clone()
    }

    pub fn progress(&self) -> u8 {
        self.lock().progress()
    }

    pub fn can_continue(&self) -> bool {
        self.lock().can_continue()
    }

    pub fn can_retry(&self) -> bool {
        self.lock().can_retry()
    }

    /// Whether a subscription task is currently running.
    pub fn is_subscribed(&self) -> bool {
        self.active.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn release(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.cancel();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionWatcher> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
