//! Session watcher state machine.
//!
//! Correlates relayed webhook events with the job the current session is
//! waiting on and decides, exactly once, that the step is complete.
//!
//! ```text
//! Idle ──begin(Some)──▶ AwaitingEvent ──observe(match)──▶ Completed
//!   │                        │
//!   └────────fail────────────┴──────────▶ Failed ──retry──▶ Idle
//! ```
//!
//! `Completed` is terminal and acts as a one-shot latch: once entered, no
//! further event (duplicate, late or out of order) produces a completion.

use serde::Serialize;

use crate::error::CoreError;
use crate::event::{WebhookEvent, TRANSACTIONS_UPDATED};
use crate::job_id::JobId;

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WatcherState {
    Idle,
    AwaitingEvent { job_id: JobId },
    Completed { job_id: JobId },
    Failed { job_id: Option<JobId>, reason: String },
}

impl WatcherState {
    /// Short name used in logs and transition errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingEvent { .. } => "awaiting_event",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Idle => None,
            Self::AwaitingEvent { job_id } | Self::Completed { job_id } => Some(job_id),
            Self::Failed { job_id, .. } => job_id.as_ref(),
        }
    }
}

/// Result of [`SessionWatcher::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// A job identifier is known; the watcher now waits for its event.
    Awaiting(JobId),
    /// No identifier could be derived. The watcher stays idle and the host
    /// should surface a non-fatal warning.
    MissingJobId,
}

/// Emitted once when a matching event completes the step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub job_id: JobId,
    pub event_type_id: String,
}

// ---------------------------------------------------------------------------
// SessionWatcher
// ---------------------------------------------------------------------------

/// Per-page-load watcher. Pure and synchronous; transports drive it.
#[derive(Debug, Clone)]
pub struct SessionWatcher {
    expected_event_type: String,
    state: WatcherState,
}

impl SessionWatcher {
    pub fn new(expected_event_type: impl Into<String>) -> Self {
        Self {
            expected_event_type: expected_event_type.into(),
            state: WatcherState::Idle,
        }
    }

    pub fn state(&self) -> &WatcherState {
        &self.state
    }

    pub fn expected_event_type(&self) -> &str {
        &self.expected_event_type
    }

    /// Register interest in a job.
    ///
    /// Only valid from `Idle`. A missing identifier leaves the watcher
    /// idle rather than failing the step.
    pub fn begin(&mut self, job_id: Option<JobId>) -> Result<BeginOutcome, CoreError> {
        if !matches!(self.state, WatcherState::Idle) {
            return Err(CoreError::InvalidTransition {
                from: self.state.name(),
                action: "begin",
            });
        }

        Ok(match job_id {
            Some(job_id) => {
                self.state = WatcherState::AwaitingEvent {
                    job_id: job_id.clone(),
                };
                BeginOutcome::Awaiting(job_id)
            }
            None => BeginOutcome::MissingJobId,
        })
    }

    /// Feed one relayed event.
    ///
    /// Returns a [`Completion`] the first time a matching event arrives
    /// while awaiting; `None` in every other case. An event that names a
    /// different job never matches; an event without a `jobId` matches on
    /// its type alone.
    pub fn observe(&mut self, event: &WebhookEvent) -> Option<Completion> {
        let WatcherState::AwaitingEvent { job_id } = &self.state else {
            return None;
        };
        if !event.is_type(&self.expected_event_type) {
            return None;
        }
        if event.job_id().is_some_and(|id| id != job_id.as_str()) {
            return None;
        }

        let job_id = job_id.clone();
        self.state = WatcherState::Completed {
            job_id: job_id.clone(),
        };
        Some(Completion {
            job_id,
            event_type_id: event.event_type_id.clone(),
        })
    }

    /// Record an upstream application error.
    ///
    /// Returns `false` without changing state when already terminal; an
    /// error reported after completion does not undo it.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        let job_id = match &self.state {
            WatcherState::Idle => None,
            WatcherState::AwaitingEvent { job_id } => Some(job_id.clone()),
            WatcherState::Completed { .. } | WatcherState::Failed { .. } => return false,
        };
        self.state = WatcherState::Failed {
            job_id,
            reason: reason.into(),
        };
        true
    }

    /// Leave `Failed` and return to `Idle` so the wait can restart.
    pub fn retry(&mut self) -> Result<(), CoreError> {
        if !matches!(self.state, WatcherState::Failed { .. }) {
            return Err(CoreError::InvalidTransition {
                from: self.state.name(),
                action: "retry",
            });
        }
        self.state = WatcherState::Idle;
        Ok(())
    }

    /// Visual progress in percent. Purely cosmetic: only [`observe`]
    /// can complete the step.
    ///
    /// [`observe`]: Self::observe
    pub fn progress(&self) -> u8 {
        match self.state {
            WatcherState::Completed { .. } => 100,
            _ => 0,
        }
    }

    /// Forward navigation is offered only once completed.
    pub fn can_continue(&self) -> bool {
        matches!(self.state, WatcherState::Completed { .. })
    }

    /// Retry is offered only after a failure.
    pub fn can_retry(&self) -> bool {
        matches!(self.state, WatcherState::Failed { .. })
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, WatcherState::AwaitingEvent { .. })
    }
}

impl Default for SessionWatcher {
    fn default() -> Self {
        Self::new(TRANSACTIONS_UPDATED)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
