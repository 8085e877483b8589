//! Request/response session.
//!
//! Turns the stream's fire-and-forget custom event channel into awaitable
//! requests with per-request identity and timeout, plus named signal
//! delivery.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`SessionBuilder`] |
//! | `core` | [`Session`] handle and inbound pump |
//! | `correlation` | [`CorrelationStore`] and [`PendingResponse`] |
//! | `gateway` | [`SessionGateway`], outbound issue and inbound routing |
//! | `options` | [`SessionOptions`] |
//! | `signal` | [`SignalRouter`] |
//! | `status` | [`SessionStateMachine`] and [`ConnectionStatus`] |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for session configuration.
pub mod builder;

/// Session handle.
pub mod core;

/// Request/response correlation.
pub mod correlation;

/// Ingress/egress routing.
pub mod gateway;

/// Session configuration.
pub mod options;

/// Named signal dispatch.
pub mod signal;

/// Connection lifecycle tracking.
pub mod status;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use core::Session;
pub use correlation::{CorrelationStore, PendingResponse};
pub use gateway::{Routed, SessionGateway};
pub use options::SessionOptions;
pub use signal::{SignalHandler, SignalRouter};
pub use status::{ConnectionStatus, SessionStateMachine};
