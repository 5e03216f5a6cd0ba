//! # Controllers module
//!
//! Three kinds of controller can drive a rollout:
//!
//! - `ADP`, a learned feedback policy evaluated directly on the relative
//!   state, with a learned value function alongside it.
//! - `MPC`, a receding horizon optimiser re-solved every step, only the first
//!   planned control is applied.
//! - `OP`, a precomputed open-loop control sequence replayed by step index.
//!
//! The kind is chosen once when the [`Controller`] is built, the rollout loop
//! only ever calls [`Controller::act`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod learned;
pub mod mpc;
pub mod open_loop;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Internal
use crate::state::RelativeState;
pub use learned::{LearnedController, LearnedPolicy, Mlp, ValueFunction};
pub use mpc::{MpcController, MpcError, MpcParams, MpcSolver, Plan};
pub use open_loop::OpenLoopController;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// What a controller is given at each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Index of the step about to be taken
    pub step: usize,

    /// Deviation of the vehicle from the lane
    pub relative: RelativeState,

    /// Current longitudinal position, locating the relative state along the
    /// lane
    pub long_pos_m: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The kinds of controller which can be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerKind {
    /// Learned policy
    #[serde(rename = "ADP")]
    Learned,

    /// Receding horizon optimisation
    #[serde(rename = "MPC")]
    Optimizing,

    /// Precomputed open-loop sequence
    #[serde(rename = "OP")]
    Precomputed,
}

/// A controller of one of the supported kinds.
pub enum Controller {
    Learned(LearnedController),
    Optimizing(MpcController),
    Precomputed(OpenLoopController),
}

/// Errors which can occur while computing a control.
#[derive(Debug, thiserror::Error)]
pub enum CtrlError {
    #[error("Open-loop sequence of length {len} cannot cover a horizon of {horizon} steps")]
    LookupOutOfRange {
        horizon: usize,
        len: usize
    },

    #[error("Optimisation failed: {0}")]
    Optimisation(#[from] MpcError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ControllerKind {
    /// All kinds in their usual reporting order.
    pub const ALL: [ControllerKind; 3] = [
        ControllerKind::Learned,
        ControllerKind::Optimizing,
        ControllerKind::Precomputed,
    ];

    /// Short identifier used on the command line and in reports.
    pub fn id(&self) -> &'static str {
        match self {
            ControllerKind::Learned => "ADP",
            ControllerKind::Optimizing => "MPC",
            ControllerKind::Precomputed => "OP",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for ControllerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADP" => Ok(ControllerKind::Learned),
            "MPC" => Ok(ControllerKind::Optimizing),
            "OP" => Ok(ControllerKind::Precomputed),
            _ => Err(format!("Unknown controller \"{}\", expected one of ADP, MPC, OP", s)),
        }
    }
}

impl Controller {
    pub fn kind(&self) -> ControllerKind {
        match self {
            Controller::Learned(_) => ControllerKind::Learned,
            Controller::Optimizing(_) => ControllerKind::Optimizing,
            Controller::Precomputed(_) => ControllerKind::Precomputed,
        }
    }

    /// Check that the controller can be run for `horizon` steps.
    ///
    /// Must be called before the first step of a rollout.
    pub fn validate(&self, horizon: usize) -> Result<(), CtrlError> {
        match self {
            Controller::Precomputed(c) => c.validate(horizon),
            _ => Ok(()),
        }
    }

    /// Compute the steering demand for the given observation.
    pub fn act(&self, obs: &Observation) -> Result<f64, CtrlError> {
        match self {
            Controller::Learned(c) => Ok(c.act(&obs.relative)),
            Controller::Optimizing(c) => c.act(obs),
            Controller::Precomputed(c) => c.act(obs.step),
        }
    }

    /// Value estimate of the relative state, only provided by learned
    /// controllers.
    pub fn value(&self, relative: &RelativeState) -> Option<f64> {
        match self {
            Controller::Learned(c) => Some(c.value(relative)),
            _ => None,
        }
    }
}
