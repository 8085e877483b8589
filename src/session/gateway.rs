//! Session gateway.
//!
//! The single point between callers issuing commands and the transport.
//! Outbound, it allocates identifiers, serializes requests, registers them
//! with the correlation store and arms their timers. Inbound, it classifies
//! each envelope and hands it to the store or the signal router.
//!
//! # Inbound Classification
//!
//! Applied in order:
//!
//! 1. `event_type` matches a completion signal pattern → signal router
//! 2. payload carries `id` → correlation store (`response` / `error` /
//!    protocol violation)
//! 3. anything else → signal router under `event_type` minus `_signal`

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result, duration_ms};
use crate::identifiers::{RequestId, RequestIdAllocator};
use crate::protocol::{Command, Envelope, ResponseBody};
use crate::transport::Transport;

use super::correlation::{CorrelationStore, PendingResponse};
use super::options::SessionOptions;
use super::signal::SignalRouter;

// ============================================================================
// Routed
// ============================================================================

/// What the gateway did with an inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Completion signal; `handled` if a subscriber ran.
    Completion {
        /// Logical signal name.
        name: String,
        /// Whether a handler was registered.
        handled: bool,
    },
    /// Response; `settled` if it completed a pending request.
    Response {
        /// Request the response addressed.
        id: RequestId,
        /// Whether a pending request was settled.
        settled: bool,
    },
    /// Bare signal; `handled` if a subscriber ran.
    Signal {
        /// Logical signal name.
        name: String,
        /// Whether a handler was registered.
        handled: bool,
    },
    /// Logged and dropped.
    Unroutable,
}

// ============================================================================
// SessionGateway
// ============================================================================

/// Single ingress/egress point for a session.
pub struct SessionGateway {
    /// Request identifier source.
    ids: RequestIdAllocator,
    /// Outstanding requests.
    store: Arc<CorrelationStore>,
    /// Signal handlers.
    router: Arc<SignalRouter>,
    /// Outbound transport.
    transport: Arc<dyn Transport>,
    /// Completion signal patterns.
    completion: RwLock<Vec<Regex>>,
    /// Default request deadline.
    request_timeout: Duration,
    /// Outstanding request limit.
    max_pending: usize,
    /// Set once the session is disposed.
    closed: AtomicBool,
}

impl fmt::Debug for SessionGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGateway")
            .field("next_id", &self.ids.peek())
            .field("pending", &self.store.pending_count())
            .field("request_timeout", &self.request_timeout)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionGateway - Constructor
// ============================================================================

impl SessionGateway {
    /// Creates a gateway over `transport`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`SessionOptions`] validation.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CorrelationStore>,
        router: Arc<SignalRouter>,
        options: &SessionOptions,
    ) -> Result<Self> {
        let completion = options.compile()?;

        Ok(Self {
            ids: RequestIdAllocator::new(),
            store,
            router,
            transport,
            completion: RwLock::new(completion),
            request_timeout: options.request_timeout,
            max_pending: options.max_pending,
            closed: AtomicBool::new(false),
        })
    }
}

// ============================================================================
// SessionGateway - Outbound
// ============================================================================

impl SessionGateway {
    /// Issues `command` with the default deadline.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue).
    pub fn request(&self, command: impl Into<Command>) -> Result<PendingResponse> {
        self.request_with_timeout(command, self.request_timeout)
    }

    /// Issues `command` with a custom deadline.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue); also [`Error::Json`] / [`Error::Protocol`]
    /// if the command's arguments fail to serialize.
    pub fn request_with_timeout(
        &self,
        command: impl Into<Command>,
        timeout: Duration,
    ) -> Result<PendingResponse> {
        let (name, args) = command.into().into_parts()?;
        self.issue(&name, args, timeout)
    }

    /// Sends `<command>_request` with `payload` and returns its pending outcome.
    ///
    /// Performs exactly one transport send. Per-request failures, including
    /// a refused send, settle the returned future rather than returning `Err`.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] if the session was disposed
    /// - [`Error::TooManyPending`] if the outstanding limit is reached
    /// - [`Error::Json`] if the envelope fails to serialize
    pub fn issue(
        &self,
        command: &str,
        payload: Map<String, Value>,
        timeout: Duration,
    ) -> Result<PendingResponse> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }

        let pending_count = self.store.pending_count();
        if pending_count >= self.max_pending {
            warn!(
                pending = pending_count,
                max = self.max_pending,
                "Too many pending requests"
            );
            return Err(Error::TooManyPending {
                pending: pending_count,
                max: self.max_pending,
            });
        }

        let id = self.ids.next_id();
        let envelope = Envelope::request(command, payload, id);
        let text = serde_json::to_string(&envelope)?;

        // Register before sending so a fast response always finds its entry.
        let pending = self.store.create_pending(id)?;
        self.store.arm_timeout(id, timeout);

        if let Err(e) = self.transport.send(text) {
            warn!(request_id = %id, command, error = %e, "Failed to send request");
            self.store.fail(id, e);
        } else {
            trace!(
                request_id = %id,
                event_type = %envelope.event_type,
                timeout_ms = duration_ms(timeout),
                "Request sent"
            );
        }

        Ok(pending)
    }

    /// Returns the default request deadline.
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

// ============================================================================
// SessionGateway - Inbound
// ============================================================================

impl SessionGateway {
    /// Routes one inbound envelope. Never sends.
    pub fn on_inbound_envelope(&self, envelope: Envelope) -> Routed {
        if self.is_completion_signal(&envelope.event_type) {
            let name = envelope.signal_name().to_string();
            let handled = self.router.dispatch(&name, envelope.signal_payload());
            return Routed::Completion { name, handled };
        }

        if envelope.has_id() {
            return self.route_response(envelope);
        }

        if envelope.event_type.is_empty() {
            warn!(payload = ?envelope.payload, "Dropping envelope without event type");
            return Routed::Unroutable;
        }

        let name = envelope.signal_name().to_string();
        let handled = self.router.dispatch(&name, envelope.signal_payload());
        Routed::Signal { name, handled }
    }

    /// Decodes and routes one inbound text frame.
    ///
    /// Frames that are not envelopes are logged and dropped.
    pub fn on_inbound_text(&self, text: &str) -> Routed {
        match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => self.on_inbound_envelope(envelope),
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to parse inbound envelope");
                Routed::Unroutable
            }
        }
    }

    /// Registers another completion signal pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`] if `pattern` does not compile.
    pub fn register_completion_signal(&self, pattern: &str) -> Result<()> {
        let regex = Regex::new(pattern)?;
        self.completion.write().push(regex);
        debug!(pattern, "Completion signal pattern registered");
        Ok(())
    }

    fn is_completion_signal(&self, event_type: &str) -> bool {
        self.completion
            .read()
            .iter()
            .any(|pattern| pattern.is_match(event_type))
    }

    fn route_response(&self, envelope: Envelope) -> Routed {
        let Some(id) = envelope.request_id() else {
            warn!(
                event_type = %envelope.event_type,
                id = ?envelope.payload.get("id"),
                "Dropping response with non-integer id"
            );
            return Routed::Unroutable;
        };

        let settled = match envelope.response_body() {
            ResponseBody::Success(value) => self.store.resolve(id, value),
            ResponseBody::Failure(message) => {
                debug!(request_id = %id, error = %message, "Remote reported failure");
                self.store.reject(id, message)
            }
            ResponseBody::Malformed => {
                warn!(
                    request_id = %id,
                    event_type = %envelope.event_type,
                    "Response carries neither response nor error"
                );
                self.store
                    .reject_unexpected(id, Value::Object(envelope.payload))
            }
        };

        Routed::Response { id, settled }
    }
}

// ============================================================================
// SessionGateway - Lifecycle
// ============================================================================

impl SessionGateway {
    /// Stops accepting new requests, fails pending ones and closes the transport.
    ///
    /// Returns the number of pending requests failed. Idempotent.
    pub fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }
        self.transport.close();
        self.store.fail_all()
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ============================================================================
// Tests
// ============================================================================
