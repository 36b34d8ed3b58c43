//! Webhook payloads received from the upstream aggregator.
//!
//! An event is immutable once received and relayed as-is: only
//! `eventTypeId` is interpreted, every other field is carried through
//! untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Event type emitted by the aggregator once a connection's transactions
/// have been fetched. This is the default completion marker.
pub const TRANSACTIONS_UPDATED: &str = "transactions.updated";

/// JSON key holding the event type.
pub const EVENT_TYPE_FIELD: &str = "eventTypeId";

/// JSON key some payloads use for the upstream job identifier.
pub const JOB_ID_FIELD: &str = "jobId";

// ---------------------------------------------------------------------------
// WebhookEvent
// ---------------------------------------------------------------------------

/// A callback payload: `{ "eventTypeId": "...", ...opaque fields }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "eventTypeId")]
    pub event_type_id: String,

    /// Every field other than `eventTypeId`, preserved verbatim.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl WebhookEvent {
    /// Build an event with no extra fields.
    pub fn new(event_type_id: impl Into<String>) -> Self {
        Self {
            event_type_id: event_type_id.into(),
            fields: Map::new(),
        }
    }

    /// Attach an opaque field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Validate the shape of an inbound JSON body.
    ///
    /// The body must be an object whose `eventTypeId` is a non-empty
    /// string. Nothing else is checked.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let Value::Object(mut fields) = value else {
            return Err(CoreError::Validation(
                "Webhook body must be a JSON object".to_string(),
            ));
        };

        match fields.remove(EVENT_TYPE_FIELD) {
            Some(Value::String(event_type_id)) if !event_type_id.trim().is_empty() => Ok(Self {
                event_type_id,
                fields,
            }),
            Some(Value::String(_)) => Err(CoreError::Validation(format!(
                "'{EVENT_TYPE_FIELD}' must not be empty"
            ))),
            Some(_) => Err(CoreError::Validation(format!(
                "'{EVENT_TYPE_FIELD}' must be a string"
            ))),
            None => Err(CoreError::Validation(format!(
                "Missing required field '{EVENT_TYPE_FIELD}'"
            ))),
        }
    }

    /// Whether this event carries the given type.
    pub fn is_type(&self, event_type_id: &str) -> bool {
        self.event_type_id == event_type_id
    }

    /// The payload's `jobId`, when present as a string.
    pub fn job_id(&self) -> Option<&str> {
        self.fields.get(JOB_ID_FIELD).and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// StoredEvent
// ---------------------------------------------------------------------------

/// The last received event together with its receipt time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub timestamp: DateTime<Utc>,
    pub data: WebhookEvent,
}

impl StoredEvent {
    /// Stamp an event with the current time.
    pub fn received_now(data: WebhookEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// PushFrame
// ---------------------------------------------------------------------------

/// Name of the push-channel message carrying a relayed event.
pub const WEBHOOK_EVENT_FRAME: &str = "webhookEvent";

/// A named message on the push channel: `{ "event": "webhookEvent", "data": {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    pub data: WebhookEvent,
}

impl PushFrame {
    pub fn webhook_event(data: WebhookEvent) -> Self {
        Self {
            event: WEBHOOK_EVENT_FRAME.to_string(),
            data,
        }
    }

    pub fn is_webhook_event(&self) -> bool {
        self.event == WEBHOOK_EVENT_FRAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
