//! Error types for the stream remote.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use stream_remote::{KitCommand, Result, Session};
//!
//! async fn example(session: &Session) -> Result<()> {
//!     let value = session.request(KitCommand::CommandUndo)?.await?;
//!     println!("{value}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Per-request | [`Error::Timeout`], [`Error::Transport`], [`Error::UnexpectedEnvelope`] |
//! | Programmer | [`Error::DuplicateId`] |
//! | Session | [`Error::SessionClosed`], [`Error::Send`], [`Error::TooManyPending`], [`Error::Protocol`] |
//! | Connection | [`Error::WebSocket`], [`Error::ConnectionTimeout`] |
//! | Configuration | [`Error::Config`] |
//! | External | [`Error::Json`], [`Error::Url`], [`Error::Pattern`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Per-request Errors
    // ========================================================================
    /// No response arrived before the request deadline.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The remote side reported a failure for this request.
    ///
    /// The message is the remote-supplied error string, verbatim.
    #[error("Request {request_id} failed: {message}")]
    Transport {
        /// The failed request ID.
        request_id: RequestId,
        /// Error string reported by the remote side.
        message: String,
    },

    /// A response matched a pending request but carried neither `response`
    /// nor `error`.
    #[error("Unexpected response envelope for request {request_id}: {payload}")]
    UnexpectedEnvelope {
        /// The request ID the envelope was addressed to.
        request_id: RequestId,
        /// The offending payload.
        payload: Value,
    },

    // ========================================================================
    // Programmer Errors
    // ========================================================================
    /// A pending entry already exists for this identifier.
    #[error("Request {request_id} is already pending")]
    DuplicateId {
        /// The duplicated request ID.
        request_id: RequestId,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The session was disposed before the request settled.
    #[error("Session closed")]
    SessionClosed,

    /// The transport refused the outgoing frame.
    #[error("Send failed: {message}")]
    Send {
        /// Description of the send failure.
        message: String,
    },

    /// Too many requests are outstanding.
    #[error("Too many pending requests: {pending}/{max}")]
    TooManyPending {
        /// Requests currently pending.
        pending: usize,
        /// Configured limit.
        max: usize,
    },

    /// Locally produced message did not have the expected shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The relay WebSocket failed, including a refused handshake.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Timed out connecting to the relay or waiting for the stream to
    /// report `connected`.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Completion signal pattern did not compile.
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a timeout error.
    #[inline]
    pub fn timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::Timeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a remote failure error.
    #[inline]
    pub fn transport(request_id: RequestId, message: impl Into<String>) -> Self {
        Self::Transport {
            request_id,
            message: message.into(),
        }
    }

    /// Creates an unexpected envelope error.
    #[inline]
    pub fn unexpected_envelope(request_id: RequestId, payload: Value) -> Self {
        Self::UnexpectedEnvelope {
            request_id,
            payload,
        }
    }

    /// Creates a duplicate id error.
    #[inline]
    pub fn duplicate_id(request_id: RequestId) -> Self {
        Self::DuplicateId { request_id }
    }

    /// Creates a send error.
    #[inline]
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
#[inline]
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ConnectionTimeout { .. })
    }

    /// Returns `true` if the remote side explicitly reported a failure.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns `true` if the remote side broke the response contract.
    #[inline]
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::UnexpectedEnvelope { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::SessionClosed
                | Self::Send { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ConnectionTimeout { .. } | Self::TooManyPending { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = Error::transport(RequestId::new(3), "prim not found");
        assert_eq!(err.to_string(), "Request 3 failed: prim not found");
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::timeout(RequestId::new(0), 5000);
        assert_eq!(err.to_string(), "Request 0 timed out after 5000ms");
    }

    #[test]
    fn test_categories_are_distinct() {
        let timeout = Error::timeout(RequestId::new(1), 100);
        let remote = Error::transport(RequestId::new(1), "boom");
        let unexpected = Error::unexpected_envelope(RequestId::new(1), json!({ "id": 1 }));

        assert!(timeout.is_timeout());
        assert!(!timeout.is_remote());
        assert!(!timeout.is_protocol_violation());

        assert!(remote.is_remote());
        assert!(!remote.is_timeout());

        assert!(unexpected.is_protocol_violation());
        assert!(!unexpected.is_timeout());
        assert!(!unexpected.is_remote());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::SessionClosed.is_connection_error());
        assert!(Error::send("closed").is_connection_error());
        assert!(!Error::config("bad").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::timeout(RequestId::new(1), 1).is_recoverable());
        assert!(!Error::duplicate_id(RequestId::new(1)).is_recoverable());
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::from_micros(999)), 0);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
