//! Envelope message type.
//!
//! Every message on the custom event channel is an [`Envelope`]: an
//! `event_type` tag plus an open JSON object payload.
//!
//! # Format
//!
//! | Shape | `event_type` | `payload` |
//! |-------|--------------|-----------|
//! | Request | `<command>_request` | `{ ...args, "id": 0 }` |
//! | Response | any | `{ "id": 0, "response": ... }` or `{ "id": 0, "error": "..." }` |
//! | Signal | `<name>_signal` | `{ "signal": ... }` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Suffix appended to command names on outgoing requests.
pub const REQUEST_SUFFIX: &str = "_request";

/// Suffix carried by signal event types.
pub const SIGNAL_SUFFIX: &str = "_signal";

/// Payload key holding the request identifier.
pub const ID_KEY: &str = "id";

/// Payload key holding a success value.
pub const RESPONSE_KEY: &str = "response";

/// Payload key holding a failure description.
pub const ERROR_KEY: &str = "error";

/// Payload key holding a signal value.
pub const SIGNAL_KEY: &str = "signal";

// ============================================================================
// Envelope
// ============================================================================

/// A single named message exchanged over the custom event channel.
///
/// # Format
///
/// ```json
/// {
///   "event_type": "select_car_request",
///   "payload": { "cgns_idx": 4, "id": 0 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event or command tag.
    pub event_type: String,

    /// Open mapping of payload fields.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Creates an envelope from its parts.
    #[inline]
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Builds an outgoing request envelope.
    ///
    /// The identifier overwrites any `id` already present in `args`.
    #[must_use]
    pub fn request(command: &str, mut args: Map<String, Value>, id: RequestId) -> Self {
        args.insert(ID_KEY.to_string(), Value::from(id.as_u64()));
        Self {
            event_type: format!("{command}{REQUEST_SUFFIX}"),
            payload: args,
        }
    }

    /// Builds a response envelope. Mostly useful for tests and loopback peers.
    #[must_use]
    pub fn response(event_type: impl Into<String>, id: RequestId, value: Value) -> Self {
        let mut payload = Map::new();
        payload.insert(ID_KEY.to_string(), Value::from(id.as_u64()));
        payload.insert(RESPONSE_KEY.to_string(), value);
        Self::new(event_type, payload)
    }

    /// Builds a failure response envelope.
    #[must_use]
    pub fn failure(event_type: impl Into<String>, id: RequestId, message: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert(ID_KEY.to_string(), Value::from(id.as_u64()));
        payload.insert(ERROR_KEY.to_string(), Value::String(message.into()));
        Self::new(event_type, payload)
    }

    /// Builds a named signal envelope (`<name>_signal`).
    #[must_use]
    pub fn signal(name: &str, value: Value) -> Self {
        let mut payload = Map::new();
        payload.insert(SIGNAL_KEY.to_string(), value);
        Self::new(format!("{name}{SIGNAL_SUFFIX}"), payload)
    }

    /// Returns `true` if the payload carries an `id` key.
    #[inline]
    #[must_use]
    pub fn has_id(&self) -> bool {
        self.payload.contains_key(ID_KEY)
    }

    /// Returns the request identifier if `id` is a non-negative integer.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        self.payload
            .get(ID_KEY)
            .and_then(Value::as_u64)
            .map(RequestId::new)
    }

    /// Returns the logical signal name: `event_type` without `_signal`.
    #[inline]
    #[must_use]
    pub fn signal_name(&self) -> &str {
        self.event_type
            .strip_suffix(SIGNAL_SUFFIX)
            .unwrap_or(&self.event_type)
    }

    /// Returns the command name of a request envelope, if it is one.
    #[inline]
    #[must_use]
    pub fn command_name(&self) -> Option<&str> {
        self.event_type.strip_suffix(REQUEST_SUFFIX)
    }

    /// Returns the signal value handed to subscribers.
    ///
    /// The embedded `signal` field when present, otherwise the whole payload.
    #[must_use]
    pub fn signal_payload(&self) -> Value {
        match self.payload.get(SIGNAL_KEY) {
            Some(value) => value.clone(),
            None => Value::Object(self.payload.clone()),
        }
    }

    /// Classifies a response-shaped payload.
    ///
    /// `response` wins when `error` is also present.
    #[must_use]
    pub fn response_body(&self) -> ResponseBody {
        let response = self.payload.get(RESPONSE_KEY);
        let error = self.payload.get(ERROR_KEY);

        match (response, error) {
            (Some(value), _) => ResponseBody::Success(value.clone()),
            (None, Some(Value::String(message))) => ResponseBody::Failure(message.clone()),
            (None, Some(other)) => ResponseBody::Failure(other.to_string()),
            (None, None) => ResponseBody::Malformed,
        }
    }
}

// ============================================================================
// ResponseBody
// ============================================================================

/// The settled content of a response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// `response` present, with or without `error`.
    Success(Value),
    /// `error` present; the remote error text.
    Failure(String),
    /// Neither `response` nor `error`.
    Malformed,
}

// ============================================================================
// Tests
// ============================================================================
