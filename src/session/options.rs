//! Session configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use stream_remote::SessionOptions;
//!
//! let options = SessionOptions::new()
//!     .with_request_timeout(Duration::from_secs(2))
//!     .with_completion_signal("^.*_complete_signal$");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default deadline for a response (5000 ms).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default maximum number of outstanding requests.
pub const DEFAULT_MAX_PENDING: usize = 256;

/// Completion signal recognized out of the box.
pub const INFERENCE_COMPLETE_PATTERN: &str = "^inference_complete_signal$";

// ============================================================================
// SessionOptions
// ============================================================================

/// Tunables for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Deadline applied when a command does not specify one.
    pub request_timeout: Duration,

    /// Outstanding requests allowed before `issue` refuses new ones.
    pub max_pending: usize,

    /// Patterns over `event_type` marking completion signals. These are
    /// routed to the signal router before any response handling.
    pub completion_signals: Vec<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_pending: DEFAULT_MAX_PENDING,
            completion_signals: vec![INFERENCE_COMPLETE_PATTERN.to_string()],
        }
    }

    /// Sets the default request deadline.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the outstanding request limit.
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    /// Adds a completion signal pattern.
    #[inline]
    #[must_use]
    pub fn with_completion_signal(mut self, pattern: impl Into<String>) -> Self {
        self.completion_signals.push(pattern.into());
        self
    }

    /// Removes all completion signal patterns, including the default.
    #[inline]
    #[must_use]
    pub fn without_completion_signals(mut self) -> Self {
        self.completion_signals.clear();
        self
    }

    /// Checks limits and compiles the completion patterns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero timeout or zero pending limit,
    /// and [`Error::Pattern`] for a pattern that does not compile.
    pub(crate) fn compile(&self) -> Result<Vec<Regex>> {
        if self.request_timeout.is_zero() {
            return Err(Error::config("request timeout must be positive"));
        }
        if self.max_pending == 0 {
            return Err(Error::config("max pending requests must be positive"));
        }

        self.completion_signals
            .iter()
            .map(|pattern| Regex::new(pattern).map_err(Error::from))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
