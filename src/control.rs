//! Typed scene control surface.
//!
//! [`SceneControl`] issues each known remote command through a [`Session`]
//! and awaits its outcome. Every method sends exactly one request and
//! settles with the remote response value or the request's error.
//!
//! # Example
//!
//! ```ignore
//! use stream_remote::{SceneControl, Session};
//!
//! let control = SceneControl::new(session.clone());
//! control.on_inference_complete(|_| println!("inference done"));
//!
//! control.select_car(4).await?;
//! control.set_slice_pos(0.25).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{Command, KitCommand, ProbeCommand, SceneCommand, VariantCommand};
use crate::session::Session;

// ============================================================================
// Constants
// ============================================================================

/// Logical name of the inference completion signal.
pub const INFERENCE_COMPLETE_SIGNAL: &str = "inference_complete";

// ============================================================================
// SceneControl
// ============================================================================

/// Async command surface for the remote scene.
#[derive(Debug, Clone)]
pub struct SceneControl {
    session: Session,
}

impl SceneControl {
    /// Wraps `session`.
    #[inline]
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Returns the underlying session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Issues `command` with the session's default deadline and awaits it.
    async fn send(&self, command: impl Into<Command>) -> Result<Value> {
        self.session.request(command)?.await
    }

    /// Registers `handler` for the inference completion signal.
    pub fn on_inference_complete<F>(&self, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.session
            .subscribe_signal(INFERENCE_COMPLETE_SIGNAL, handler);
    }
}

// ============================================================================
// SceneControl - Scene
// ============================================================================

impl SceneControl {
    /// Switches to the vehicle at dataset index `cgns_idx`.
    ///
    /// # Errors
    ///
    /// Returns the request's error (timeout, remote failure, closed session).
    pub async fn select_car(&self, cgns_idx: u32) -> Result<Value> {
        self.send(SceneCommand::select_car_by_dataset(cgns_idx)).await
    }

    /// Switches to a catalogue vehicle by variant.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn select_car_variant(
        &self,
        car_idx: u32,
        prim_path: impl Into<String>,
        variant_set_name: impl Into<String>,
        variant_value: impl Into<String>,
    ) -> Result<Value> {
        self.send(SceneCommand::SelectCar {
            cgns_idx: None,
            car_idx: Some(car_idx),
            prim_path: Some(prim_path.into()),
            variant_set_name: Some(variant_set_name.into()),
            variant_value: Some(variant_value.into()),
        })
        .await
    }

    /// Jumps to the camera at `prim_path`.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_camera_view(&self, prim_path: impl Into<String>) -> Result<Value> {
        self.send(SceneCommand::SetCameraView {
            prim_path: prim_path.into(),
        })
        .await
    }

    /// Makes the camera at `camera_prim_path` interactive.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_interactive_camera(
        &self,
        camera_prim_path: impl Into<String>,
    ) -> Result<Value> {
        self.send(SceneCommand::SetInteractiveCamera {
            camera_prim_path: camera_prim_path.into(),
        })
        .await
    }

    /// Changes the renderer mode.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_rendering_mode(&self, mode: i64) -> Result<Value> {
        self.send(SceneCommand::SetRenderingMode { mode }).await
    }

    /// Chooses the visualized attribute.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_visualization_attribute_state(
        &self,
        attribute: impl Into<String>,
    ) -> Result<Value> {
        self.send(SceneCommand::SetVisualizationAttributeState {
            attribute: attribute.into(),
        })
        .await
    }
}

// ============================================================================
// SceneControl - Variants
// ============================================================================

impl SceneControl {
    /// Selects the rim variant for inference result `inference_id`.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_rim_variant(&self, inference_id: u32) -> Result<Value> {
        self.send(VariantCommand::SetRimVariant { inference_id })
            .await
    }

    /// Selects the mirror variant.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_mirror_variant(&self, inference_id: u32) -> Result<Value> {
        self.send(VariantCommand::SetMirrorVariant { inference_id })
            .await
    }

    /// Selects the spoiler variant.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_spoiler_variant(&self, inference_id: u32) -> Result<Value> {
        self.send(VariantCommand::SetSpoilerVariant { inference_id })
            .await
    }

    /// Selects the ride height variant.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_ride_height_variant(&self, inference_id: u32) -> Result<Value> {
        self.send(VariantCommand::SetRideHeightVariant { inference_id })
            .await
    }
}

// ============================================================================
// SceneControl - Probes
// ============================================================================

impl SceneControl {
    /// Chooses the slice plane axis.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_slice_state(&self, state: impl Into<String>) -> Result<Value> {
        self.send(ProbeCommand::SetSliceState {
            state: state.into(),
        })
        .await
    }

    /// Moves the slice plane.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_slice_pos(&self, pct: f64) -> Result<Value> {
        self.send(ProbeCommand::SetSlicePos { pct }).await
    }

    /// Moves the streamline seed.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_streamlines_pos(&self, pct: [f64; 3]) -> Result<Value> {
        self.send(ProbeCommand::SetStreamlinesPos { pct }).await
    }

    /// Resizes the streamline seed.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_streamlines_radius(&self, pct: f64) -> Result<Value> {
        self.send(ProbeCommand::SetStreamlinesRadius { pct }).await
    }

    /// Moves the smoke probe rake.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn set_smokeprobes_pos(&self, pct: [f64; 3]) -> Result<Value> {
        self.send(ProbeCommand::SetSmokeprobesPos { pct }).await
    }
}

// ============================================================================
// SceneControl - Kit
// ============================================================================

impl SceneControl {
    /// Runs the Kit command `name` with `kwargs`.
    ///
    /// Returns the command's success flag.
    ///
    /// # Errors
    ///
    /// Returns the request's error, or [`Error::Protocol`] if the response
    /// is not a boolean.
    pub async fn command_execute(
        &self,
        name: impl Into<String>,
        kwargs: Map<String, Value>,
    ) -> Result<bool> {
        let name = name.into();
        debug!(command = %name, "Executing Kit command");
        let value = self
            .send(KitCommand::CommandExecute { name, kwargs })
            .await?;
        expect_bool("command_execute", value)
    }

    /// Undoes the last Kit command.
    ///
    /// # Errors
    ///
    /// Same as [`command_execute`](Self::command_execute).
    pub async fn command_undo(&self) -> Result<bool> {
        let value = self.send(KitCommand::CommandUndo).await?;
        expect_bool("command_undo", value)
    }
}

fn expect_bool(command: &str, value: Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::protocol(format!("{command} returned non-boolean {value}")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::protocol::Envelope;
    use crate::transport::{ChannelPeer, ChannelTransport};

    fn control() -> (SceneControl, ChannelPeer) {
        let (transport, peer) = ChannelTransport::pair();
        let session = Session::builder().build(transport).expect("session");
        (SceneControl::new(session), peer)
    }

    /// Answers the next request with `value` and returns it.
    async fn answer(peer: &mut ChannelPeer, value: Value) -> Envelope {
        let request = peer.recv().await.expect("request");
        peer.respond(&request, value).expect("respond");
        request
    }

    #[tokio::test]
    async fn test_select_car() {
        let (control, mut peer) = control();

        let (outcome, request) = tokio::join!(
            control.select_car(4),
            answer(&mut peer, json!({ "ok": true }))
        );

        assert_eq!(outcome.expect("ok"), json!({ "ok": true }));
        assert_eq!(request.event_type, "select_car_request");
        assert_eq!(request.payload.get("cgns_idx"), Some(&json!(4)));
    }

    #[tokio::test]
    async fn test_probe_and_variant_commands() {
        let (control, mut peer) = control();

        let (outcome, request) = tokio::join!(
            control.set_streamlines_pos([0.1, 0.2, 0.3]),
            answer(&mut peer, Value::Null)
        );
        outcome.expect("ok");
        assert_eq!(request.event_type, "set_streamlines_pos_request");
        assert_eq!(request.payload.get("pct"), Some(&json!([0.1, 0.2, 0.3])));

        let (outcome, request) = tokio::join!(
            control.set_spoiler_variant(3),
            answer(&mut peer, Value::Null)
        );
        outcome.expect("ok");
        assert_eq!(request.event_type, "set_spoiler_variant_request");
        assert_eq!(request.payload.get("inference_id"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_command_execute_returns_flag() {
        let (control, mut peer) = control();

        let mut kwargs = Map::new();
        kwargs.insert("prim_type".into(), json!("Cube"));

        let (outcome, request) = tokio::join!(
            control.command_execute("CreateMeshPrimWithDefaultXform", kwargs),
            answer(&mut peer, json!(true))
        );
        assert!(outcome.expect("ok"));
        assert_eq!(request.payload.get("prim_type"), Some(&json!("Cube")));
    }

    #[tokio::test]
    async fn test_command_undo_non_bool_is_protocol_error() {
        let (control, mut peer) = control();

        let (outcome, _) = tokio::join!(control.command_undo(), answer(&mut peer, json!("yes")));
        assert!(matches!(outcome, Err(Error::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let (control, mut peer) = control();

        let respond = async {
            let request = peer.recv().await.expect("request");
            peer.fail(&request, "camera not found").expect("fail");
        };
        let (outcome, ()) = tokio::join!(control.set_camera_view("/World/Cam"), respond);

        let err = outcome.expect_err("remote failure");
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_on_inference_complete() {
        let (control, peer) = control();
        let (tx, mut rx) = mpsc::unbounded_channel();
        control.on_inference_complete(move |v| {
            let _ = tx.send(v);
        });

        peer.signal("inference_complete", json!("inference_start"))
            .expect("signal");
        assert_eq!(rx.recv().await, Some(json!("inference_start")));
    }
}
