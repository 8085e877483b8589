//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and creating [`Session`] instances.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use stream_remote::{Session, WebSocketTransport};
//!
//! let transport = WebSocketTransport::connect(&url).await?;
//! let session = Session::builder()
//!     .request_timeout(Duration::from_secs(10))
//!     .completion_signal("^bake_complete_signal$")
//!     .build(transport)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::transport::Transport;

use super::core::Session;
use super::correlation::CorrelationStore;
use super::gateway::SessionGateway;
use super::options::SessionOptions;
use super::signal::SignalRouter;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`] instance.
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct SessionBuilder {
    /// Session tunables.
    options: SessionOptions,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a new builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the deadline for commands issued without one.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_request_timeout(timeout);
        self
    }

    /// Sets the outstanding request limit.
    #[inline]
    #[must_use]
    pub fn max_pending(mut self, max: usize) -> Self {
        self.options = self.options.with_max_pending(max);
        self
    }

    /// Adds a completion signal pattern over `event_type`.
    #[inline]
    #[must_use]
    pub fn completion_signal(mut self, pattern: impl Into<String>) -> Self {
        self.options = self.options.with_completion_signal(pattern);
        self
    }

    /// Builds the session over `transport`.
    ///
    /// If the transport yields inbound frames, a pump task is spawned, so
    /// this must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if a limit is zero
    /// - [`Error::Pattern`](crate::Error::Pattern) if a completion pattern is invalid
    pub fn build(self, transport: impl Transport) -> Result<Session> {
        self.build_shared(Arc::new(transport))
    }

    /// Builds the session over a transport shared with other owners.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_shared(self, transport: Arc<dyn Transport>) -> Result<Session> {
        let store = Arc::new(CorrelationStore::new());
        let router = Arc::new(SignalRouter::new());
        let inbound = transport.take_inbound();

        let gateway = SessionGateway::new(
            transport,
            Arc::clone(&store),
            Arc::clone(&router),
            &self.options,
        )?;

        Ok(Session::start(Arc::new(gateway), store, router, inbound))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::transport::ChannelTransport;

    #[test]
    fn test_builder_defaults() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.options, SessionOptions::new());
    }

    #[test]
    fn test_builder_setters() {
        let builder = SessionBuilder::new()
            .request_timeout(Duration::from_millis(250))
            .max_pending(4)
            .completion_signal("^x_signal$");
        assert_eq!(builder.options.request_timeout, Duration::from_millis(250));
        assert_eq!(builder.options.max_pending, 4);
        assert_eq!(builder.options.completion_signals.len(), 2);
    }

    #[tokio::test]
    async fn test_build_rejects_bad_pattern() {
        let (transport, _peer) = ChannelTransport::pair();
        let err = SessionBuilder::new()
            .completion_signal("[")
            .build(transport)
            .expect_err("bad pattern");
        assert!(matches!(err, Error::Pattern(_)));
    }

    #[tokio::test]
    async fn test_build_rejects_zero_limit() {
        let (transport, _peer) = ChannelTransport::pair();
        let err = SessionBuilder::new()
            .max_pending(0)
            .build(transport)
            .expect_err("zero limit");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_build_uses_request_timeout() {
        let (transport, _peer) = ChannelTransport::pair();
        let session = SessionBuilder::new()
            .request_timeout(Duration::from_millis(750))
            .build(transport)
            .expect("session");
        assert_eq!(session.request_timeout(), Duration::from_millis(750));
    }
}
