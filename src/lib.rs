//! Stream remote - request/response control over a rendering stream.
//!
//! A remote rendering server streams video to the client and exposes a
//! side channel for custom events. That channel is fire-and-forget and
//! multiplexed. This library turns it into awaitable requests with
//! per-request identity and timeout, plus named out-of-band signals.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  request()   ┌──────────────────┐  send(text)  ┌─────────────┐
//! │ SceneControl │─────────────►│  SessionGateway  │─────────────►│  Transport  │
//! └──────────────┘              │                  │              │ (ws / chan) │
//!        ▲                      │  CorrelationStore│◄─────────────│             │
//!        │ PendingResponse      │  SignalRouter    │   Inbound    └─────────────┘
//!        └──────────────────────│  StateMachine    │
//!                               └──────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - One explicitly constructed [`Session`] owns the id counter, store,
//!   router and connection status
//! - Requests are `<command>_request` envelopes carrying a numeric `id`
//! - Settlement is event-driven (no polling); a per-request timer expires
//!   unanswered requests
//! - Lifecycle errors surface as a status change, never as a request error
//!
//! # Quick Start
//!
//! ```ignore
//! use stream_remote::{SceneControl, Session, StreamOptions, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> stream_remote::Result<()> {
//!     let options = StreamOptions::new("render-host");
//!     let transport =
//!         WebSocketTransport::connect_with("ws://render-host:8011/stream", &options).await?;
//!
//!     let session = Session::builder().build(transport)?;
//!     session.wait_connected(std::time::Duration::from_secs(30)).await?;
//!
//!     let control = SceneControl::new(session.clone());
//!     control.select_car(4).await?;
//!
//!     session.dispose();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`control`] | Typed scene command surface |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Request identifiers |
//! | [`protocol`] | Envelope, command and lifecycle message types |
//! | [`session`] | Correlation, signal routing, connection status |
//! | [`transport`] | Channel and WebSocket transports |

// ============================================================================
// Modules
// ============================================================================

/// Typed scene command surface.
pub mod control;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Request identifiers and their allocator.
pub mod identifiers;

/// Wire message types.
///
/// Envelopes, typed commands and lifecycle events.
pub mod protocol;

/// Request/response session.
///
/// Use [`Session::builder()`] to create a session over a transport.
pub mod session;

/// Transport layer.
///
/// The [`Transport`] trait plus in-process and WebSocket adapters.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Control surface
pub use control::SceneControl;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, RequestIdAllocator};

// Protocol types
pub use protocol::{
    Command, CustomCommand, Envelope, KitCommand, LifecycleEvent, LifecycleStatus, ProbeCommand,
    ResponseBody, SceneCommand, VariantCommand,
};

// Session types
pub use session::{
    ConnectionStatus, PendingResponse, Routed, Session, SessionBuilder, SessionOptions,
};

// Transport types
pub use transport::{ChannelPeer, ChannelTransport, StreamOptions, Transport, WebSocketTransport};
