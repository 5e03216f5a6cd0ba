//! Simulation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::{
    ctrl::MpcParams,
    dynamics::VehicleParams,
    reference::ReferenceParams,
    state::AbsoluteState,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// All parameters of a simulation run. Every section may be omitted from the
/// parameter file, in which case its defaults are used.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SimParams {
    pub vehicle: VehicleParams,
    pub lane: ReferenceParams,
    pub sim: SimSection,
    pub mpc: MpcParams,
    pub open_loop: OpenLoopSection,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimSection {
    /// Number of steps in every rollout
    pub steps: usize,

    /// Longitudinal position the vehicle starts from
    pub start_long_pos_m: f64,

    /// Initial heading. If not given the heading of the lane at its origin is
    /// used.
    pub initial_head_rad: Option<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OpenLoopSection {
    /// Length of the precomputed open-loop plan
    pub steps: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimParams {
    /// Initial ground frame state shared by every rollout.
    pub fn initial_state(&self) -> AbsoluteState {
        AbsoluteState::new(
            0.0,
            0.0,
            self.sim.initial_head_rad.unwrap_or_else(|| self.lane.initial_heading_rad()),
            0.0,
            self.sim.start_long_pos_m
        )
    }
}

impl Default for SimSection {
    fn default() -> Self {
        Self {
            steps: 500,
            start_long_pos_m: 0.0,
            initial_head_rad: None,
        }
    }
}

impl Default for OpenLoopSection {
    fn default() -> Self {
        Self { steps: 500 }
    }
}
