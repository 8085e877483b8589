//! Transport layer.
//!
//! The streaming client is an external service. This module defines the
//! seam the session talks through and ships two adapters.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐      send(text)       ┌──────────────────┐
//! │     Session     │──────────────────────►│    Transport     │
//! │                 │                       │  (channel / ws)  │
//! │  inbound pump   │◄──────────────────────│                  │
//! └─────────────────┘   Inbound frames      └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | In-process transport backed by tokio channels |
//! | `connection` | WebSocket client transport and event loop |
//! | `options` | Stream parameters and relay URL construction |

// ============================================================================
// Submodules
// ============================================================================

/// In-process channel transport.
pub mod channel;

/// WebSocket client transport.
pub mod connection;

/// Stream parameters.
pub mod options;

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::Result;
use crate::protocol::{Envelope, LifecycleEvent};

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{ChannelPeer, ChannelTransport};
pub use connection::WebSocketTransport;
pub use options::StreamOptions;

// ============================================================================
// Transport
// ============================================================================

/// Outbound side of the streaming client.
///
/// Implementations must not block: `send` queues the frame and returns.
pub trait Transport: Send + Sync + 'static {
    /// Queues one serialized envelope for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Send`](crate::Error::Send) if the transport is closed.
    fn send(&self, text: String) -> Result<()>;

    /// Hands over the inbound frame stream, once.
    ///
    /// Transports that deliver inbound traffic through their own callbacks
    /// return `None`; the caller then feeds the session directly.
    fn take_inbound(&self) -> Option<InboundReceiver> {
        None
    }

    /// Stops the transport. Further sends fail.
    fn close(&self) {}
}

// ============================================================================
// Inbound
// ============================================================================

/// Receiver of inbound frames.
pub type InboundReceiver = mpsc::UnboundedReceiver<Inbound>;

/// Sender of inbound frames.
pub type InboundSender = mpsc::UnboundedSender<Inbound>;

/// A frame delivered by the streaming client.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Custom event channel message.
    Custom(Envelope),
    /// Start/update lifecycle callback.
    Lifecycle(LifecycleEvent),
    /// The transport closed.
    Closed,
}

/// Wire shapes accepted on a raw text channel.
#[derive(Deserialize)]
#[serde(untagged)]
enum Frame {
    Custom(Envelope),
    Lifecycle(LifecycleEvent),
}

impl Inbound {
    /// Decodes a text frame. Unrecognized frames are logged and dropped.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str::<Frame>(text) {
            Ok(Frame::Custom(envelope)) => Some(Self::Custom(envelope)),
            Ok(Frame::Lifecycle(event)) => Some(Self::Lifecycle(event)),
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to parse inbound frame");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::LifecycleStatus;

    #[test]
    fn test_parse_custom() {
        let frame = Inbound::parse(r#"{"event_type":"x_signal","payload":{"signal":1}}"#);
        assert!(matches!(frame, Some(Inbound::Custom(e)) if e.event_type == "x_signal"));
    }

    #[test]
    fn test_parse_lifecycle() {
        let frame = Inbound::parse(r#"{"action":"start","status":"success"}"#);
        assert_eq!(
            frame,
            Some(Inbound::Lifecycle(LifecycleEvent::start(LifecycleStatus::Success)))
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(Inbound::parse("not json"), None);
        assert_eq!(Inbound::parse(r#"{"unrelated":true}"#), None);
    }
}
