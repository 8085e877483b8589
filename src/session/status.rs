//! Connection lifecycle tracking.
//!
//! Observes `start` lifecycle events from the streaming client and keeps a
//! single current [`ConnectionStatus`]. Transitions are not ordered
//! strictly: the stream may report `success` without a prior `inProgress`,
//! or resend `inProgress` after `success`, and both are accepted.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, duration_ms};
use crate::protocol::{LifecycleEvent, LifecycleStatus};

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Connection state of the streaming session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Nothing reported yet.
    #[default]
    Waiting,
    /// The stream is starting.
    Connecting,
    /// The stream is up; commands may be issued.
    Connected,
    /// The stream failed to start or dropped.
    Error,
}

impl ConnectionStatus {
    /// Returns `true` if commands may be issued.
    #[inline]
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Maps a lifecycle status onto a connection status.
    #[inline]
    #[must_use]
    pub const fn from_lifecycle(status: LifecycleStatus) -> Option<Self> {
        match status {
            LifecycleStatus::InProgress => Some(Self::Connecting),
            LifecycleStatus::Success => Some(Self::Connected),
            LifecycleStatus::Error => Some(Self::Error),
            LifecycleStatus::Unknown => None,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Waiting => "waiting",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(text)
    }
}

// ============================================================================
// SessionStateMachine
// ============================================================================

/// Owns the session's current [`ConnectionStatus`].
///
/// Readers either poll [`current`](Self::current) or hold a
/// [`watch::Receiver`] from [`subscribe`](Self::subscribe).
#[derive(Debug)]
pub struct SessionStateMachine {
    tx: watch::Sender<ConnectionStatus>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Creates a state machine in [`ConnectionStatus::Waiting`].
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionStatus::Waiting);
        Self { tx }
    }

    /// Applies a lifecycle event.
    ///
    /// Returns the new status when the event was a recognized `start`
    /// event, `None` when it was ignored.
    pub fn observe(&self, event: &LifecycleEvent) -> Option<ConnectionStatus> {
        if !event.is_start() {
            debug!(action = %event.action, "Ignoring non-start lifecycle event");
            return None;
        }

        let Some(next) = ConnectionStatus::from_lifecycle(event.status) else {
            debug!(status = ?event.status, "Ignoring unknown lifecycle status");
            return None;
        };

        self.set(next);
        Some(next)
    }

    /// Returns to [`ConnectionStatus::Waiting`] after the transport
    /// restarted its lifecycle.
    pub fn reset(&self) {
        self.set(ConnectionStatus::Waiting);
    }

    /// Forces [`ConnectionStatus::Error`], used when the transport itself fails.
    pub fn fail(&self) {
        self.set(ConnectionStatus::Error);
    }

    /// Returns the current status.
    #[inline]
    #[must_use]
    pub fn current(&self) -> ConnectionStatus {
        *self.tx.borrow()
    }

    /// Returns a receiver notified on every status change.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    /// Waits until the status equals `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionTimeout`] if `target` is not reached within
    /// `wait`.
    pub async fn wait_for(&self, target: ConnectionStatus, wait: Duration) -> Result<()> {
        let mut rx = self.subscribe();
        match timeout(wait, rx.wait_for(|status| *status == target)).await {
            Ok(Ok(_)) => Ok(()),
            // The sender lives in `self`, so the channel cannot close here.
            Ok(Err(_)) => Err(Error::SessionClosed),
            Err(_) => Err(Error::connection_timeout(duration_ms(wait))),
        }
    }

    fn set(&self, next: ConnectionStatus) {
        let previous = self.tx.send_replace(next);
        if previous == next {
            return;
        }

        match next {
            ConnectionStatus::Error => warn!(from = %previous, "Stream connection error"),
            _ => info!(from = %previous, to = %next, "Stream status changed"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
