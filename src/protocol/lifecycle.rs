//! Stream lifecycle messages.
//!
//! The streaming client reports connection progress through its start and
//! update callbacks, outside the custom event channel.
//!
//! # Format
//!
//! ```json
//! { "action": "start", "status": "inProgress" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// The only action the connection state machine reacts to.
pub const START_ACTION: &str = "start";

// ============================================================================
// LifecycleEvent
// ============================================================================

/// A lifecycle notification from the streaming client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Lifecycle action (`start`, `stop`, `terminate`, ...).
    pub action: String,

    /// Progress of the action.
    #[serde(default)]
    pub status: LifecycleStatus,
}

impl LifecycleEvent {
    /// Creates a lifecycle event.
    #[inline]
    #[must_use]
    pub fn new(action: impl Into<String>, status: LifecycleStatus) -> Self {
        Self {
            action: action.into(),
            status,
        }
    }

    /// Creates a `start` event.
    #[inline]
    #[must_use]
    pub fn start(status: LifecycleStatus) -> Self {
        Self::new(START_ACTION, status)
    }

    /// Returns `true` for `start` actions.
    #[inline]
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.action == START_ACTION
    }
}

// ============================================================================
// LifecycleStatus
// ============================================================================

/// Progress reported for a lifecycle action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleStatus {
    /// Action under way.
    InProgress,
    /// Action completed.
    Success,
    /// Action failed.
    Error,
    /// Any status this crate does not model.
    #[default]
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_in_progress() {
        let event: LifecycleEvent =
            serde_json::from_str(r#"{"action":"start","status":"inProgress"}"#).expect("parse");
        assert!(event.is_start());
        assert_eq!(event.status, LifecycleStatus::InProgress);
    }

    #[test]
    fn test_unknown_status() {
        let event: LifecycleEvent =
            serde_json::from_str(r#"{"action":"start","status":"paused"}"#).expect("parse");
        assert_eq!(event.status, LifecycleStatus::Unknown);
    }

    #[test]
    fn test_missing_status() {
        let event: LifecycleEvent = serde_json::from_str(r#"{"action":"stop"}"#).expect("parse");
        assert!(!event.is_start());
        assert_eq!(event.status, LifecycleStatus::Unknown);
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&LifecycleEvent::start(LifecycleStatus::Success))
            .expect("serialize");
        assert_eq!(json, r#"{"action":"start","status":"success"}"#);
    }
}
