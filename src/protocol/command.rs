//! Command definitions organized by concern.
//!
//! Each command serializes to a `command` name and an `args` object. The
//! gateway turns that pair into a `<command>_request` envelope.
//!
//! # Command Groups
//!
//! | Group | Commands |
//! |-------|----------|
//! | `scene` | Vehicle selection, cameras, render mode, visualized attribute |
//! | `variant` | Rim, mirror, spoiler and ride height variants |
//! | `probe` | Slice plane, streamlines, smoke probes |
//! | `kit` | Generic Kit command execution and undo |
//! | custom | Any other command name with free-form args |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All known remote commands, plus an escape hatch for unknown ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Scene and camera commands.
    Scene(SceneCommand),
    /// Vehicle variant commands.
    Variant(VariantCommand),
    /// Flow visualization probe commands.
    Probe(ProbeCommand),
    /// Generic Kit command execution.
    Kit(KitCommand),
    /// Command not modeled by this crate.
    Custom(CustomCommand),
}

impl Command {
    /// Splits the command into its wire name and argument object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if arguments fail to serialize, or
    /// [`Error::Protocol`] if they do not serialize to an object.
    pub fn into_parts(self) -> Result<(String, Map<String, Value>)> {
        match self {
            Self::Scene(cmd) => split_tagged(&cmd),
            Self::Variant(cmd) => split_tagged(&cmd),
            Self::Probe(cmd) => split_tagged(&cmd),
            Self::Kit(cmd) => split_tagged(&cmd),
            Self::Custom(cmd) => Ok((cmd.name, cmd.args)),
        }
    }
}

impl From<SceneCommand> for Command {
    fn from(cmd: SceneCommand) -> Self {
        Self::Scene(cmd)
    }
}

impl From<VariantCommand> for Command {
    fn from(cmd: VariantCommand) -> Self {
        Self::Variant(cmd)
    }
}

impl From<ProbeCommand> for Command {
    fn from(cmd: ProbeCommand) -> Self {
        Self::Probe(cmd)
    }
}

impl From<KitCommand> for Command {
    fn from(cmd: KitCommand) -> Self {
        Self::Kit(cmd)
    }
}

impl From<CustomCommand> for Command {
    fn from(cmd: CustomCommand) -> Self {
        Self::Custom(cmd)
    }
}

/// Serializes an adjacently tagged command and pulls out name and args.
fn split_tagged<T: Serialize>(cmd: &T) -> Result<(String, Map<String, Value>)> {
    let Value::Object(mut object) = serde_json::to_value(cmd)? else {
        return Err(Error::protocol("command did not serialize to an object"));
    };

    let name = match object.remove("command") {
        Some(Value::String(name)) => name,
        _ => return Err(Error::protocol("command name missing")),
    };

    let args = match object.remove("args") {
        Some(Value::Object(args)) => args,
        None | Some(Value::Null) => Map::new(),
        Some(other) => {
            return Err(Error::protocol(format!(
                "arguments of {name} are not an object: {other}"
            )));
        }
    };

    Ok((name, args))
}

// ============================================================================
// Scene Commands
// ============================================================================

/// Scene-level commands: vehicle, cameras, rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum SceneCommand {
    /// Switch the displayed vehicle.
    SelectCar {
        /// Index into the simulation dataset.
        #[serde(skip_serializing_if = "Option::is_none")]
        cgns_idx: Option<u32>,
        /// Index into the vehicle catalogue.
        #[serde(skip_serializing_if = "Option::is_none")]
        car_idx: Option<u32>,
        /// Prim holding the vehicle variant set.
        #[serde(skip_serializing_if = "Option::is_none")]
        prim_path: Option<String>,
        /// Variant set name.
        #[serde(skip_serializing_if = "Option::is_none")]
        variant_set_name: Option<String>,
        /// Variant to select.
        #[serde(skip_serializing_if = "Option::is_none")]
        variant_value: Option<String>,
    },

    /// Jump to a fixed camera.
    SetCameraView {
        /// Camera prim path.
        prim_path: String,
    },

    /// Make a camera the interactive viewport camera.
    SetInteractiveCamera {
        /// Camera prim path.
        camera_prim_path: String,
    },

    /// Change the renderer mode.
    SetRenderingMode {
        /// Renderer mode index.
        mode: i64,
    },

    /// Choose which simulated attribute is visualized.
    SetVisualizationAttributeState {
        /// Attribute name.
        attribute: String,
    },
}

impl SceneCommand {
    /// Selects a vehicle by dataset index only.
    #[inline]
    #[must_use]
    pub fn select_car_by_dataset(cgns_idx: u32) -> Self {
        Self::SelectCar {
            cgns_idx: Some(cgns_idx),
            car_idx: None,
            prim_path: None,
            variant_set_name: None,
            variant_value: None,
        }
    }
}

// ============================================================================
// Variant Commands
// ============================================================================

/// Vehicle geometry variants, each picked by inference result index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum VariantCommand {
    /// Rim design.
    SetRimVariant {
        /// Inference result index.
        inference_id: u32,
    },
    /// Side mirrors on/off.
    SetMirrorVariant {
        /// Inference result index.
        inference_id: u32,
    },
    /// Spoiler on/off.
    SetSpoilerVariant {
        /// Inference result index.
        inference_id: u32,
    },
    /// Ride height level.
    SetRideHeightVariant {
        /// Inference result index.
        inference_id: u32,
    },
}

// ============================================================================
// Probe Commands
// ============================================================================

/// Flow visualization probes. Positions are normalized to `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum ProbeCommand {
    /// Choose the slice plane axis.
    SetSliceState {
        /// Axis name (`x`, `y`, `z`).
        state: String,
    },
    /// Move the slice plane along its axis.
    SetSlicePos {
        /// Normalized position.
        pct: f64,
    },
    /// Move the streamline seed.
    SetStreamlinesPos {
        /// Normalized position per axis.
        pct: [f64; 3],
    },
    /// Resize the streamline seed sphere.
    SetStreamlinesRadius {
        /// Normalized radius.
        pct: f64,
    },
    /// Move the smoke probe rake.
    SetSmokeprobesPos {
        /// Normalized position per axis.
        pct: [f64; 3],
    },
}

// ============================================================================
// Kit Commands
// ============================================================================

/// Generic Kit command execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum KitCommand {
    /// Run a registered Kit command by name.
    CommandExecute {
        /// Kit command name.
        name: String,
        /// Keyword arguments forwarded to the command.
        #[serde(flatten)]
        kwargs: Map<String, Value>,
    },
    /// Undo the last Kit command.
    CommandUndo,
}

// ============================================================================
// CustomCommand
// ============================================================================

/// Forward-compatible command with free-form arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomCommand {
    /// Command name without the `_request` suffix.
    pub name: String,
    /// Argument object.
    pub args: Map<String, Value>,
}

impl CustomCommand {
    /// Creates a command with no arguments.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Map::new(),
        }
    }

    /// Adds an argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
