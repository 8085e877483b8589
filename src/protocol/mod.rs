//! Wire message types.
//!
//! This module defines the message format exchanged with the remote
//! application over the stream's custom event channel.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Envelope` (request) | Local → Remote | Command with embedded `id` |
//! | `Envelope` (response) | Remote → Local | `response` or `error` for an `id` |
//! | `Envelope` (signal) | Remote → Local | Unsolicited named notification |
//! | `LifecycleEvent` | Stream → Local | Connection progress |
//!
//! # Command Naming
//!
//! Commands are snake_case names; requests carry them with a `_request`
//! suffix and signals carry a `_signal` suffix:
//!
//! - `select_car_request`
//! - `inference_complete_signal`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Typed command definitions |
//! | `envelope` | Envelope type and classification helpers |
//! | `lifecycle` | Stream lifecycle events |

// ============================================================================
// Submodules
// ============================================================================

/// Typed command definitions.
pub mod command;

/// Envelope type.
pub mod envelope;

/// Stream lifecycle events.
pub mod lifecycle;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, CustomCommand, KitCommand, ProbeCommand, SceneCommand, VariantCommand};
pub use envelope::{Envelope, ResponseBody};
pub use lifecycle::{LifecycleEvent, LifecycleStatus};
