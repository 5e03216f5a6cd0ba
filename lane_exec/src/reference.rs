//! # Reference trajectory
//!
//! The reference is the lane centre line expressed as a target state for
//! every longitudinal position. It is stateless and is re-evaluated every
//! time it is needed, since the longitudinal position changes each step.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::state::ReferenceState;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A reference trajectory, a pure function of longitudinal position.
pub trait Reference: Send + Sync {
    /// Evaluate the reference at the given longitudinal position.
    fn at(&self, long_pos_m: f64) -> ReferenceState;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A sinusoidal lane, `y = a sin(k x)`.
///
/// The target heading follows the tangent of the lane. The target lateral
/// velocity and yaw rate are zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SineLane {
    /// Amplitude of the lane centre line
    pub amplitude_m: f64,

    /// Spatial frequency of the lane centre line
    pub wavenumber_radm: f64,
}

/// A straight lane along the x axis, the constant zero reference.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlatLane;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Lane shape selection as it appears in the parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ReferenceParams {
    Sine(SineLane),
    Flat,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SineLane {
    /// The heading of the lane at the origin, which is also the default
    /// initial heading of the vehicle.
    pub fn initial_heading_rad(&self) -> f64 {
        self.amplitude_m * self.wavenumber_radm
    }
}

impl Default for SineLane {
    fn default() -> Self {
        Self {
            amplitude_m: 1.0,
            wavenumber_radm: 1.0 / 30.0,
        }
    }
}

impl Reference for SineLane {
    fn at(&self, long_pos_m: f64) -> ReferenceState {
        let a = self.amplitude_m;
        let k = self.wavenumber_radm;

        ReferenceState::new(
            a * (k * long_pos_m).sin(),
            0.0,
            (a * k * (k * long_pos_m).cos()).atan(),
            0.0
        )
    }
}

impl Reference for FlatLane {
    fn at(&self, _long_pos_m: f64) -> ReferenceState {
        ReferenceState::default()
    }
}

impl ReferenceParams {
    /// Build the reference described by these parameters.
    pub fn build(&self) -> Box<dyn Reference> {
        match self {
            ReferenceParams::Sine(lane) => Box::new(*lane),
            ReferenceParams::Flat => Box::new(FlatLane),
        }
    }

    /// Heading of the lane at the origin.
    pub fn initial_heading_rad(&self) -> f64 {
        match self {
            ReferenceParams::Sine(lane) => lane.initial_heading_rad(),
            ReferenceParams::Flat => 0.0,
        }
    }
}

impl Default for ReferenceParams {
    fn default() -> Self {
        ReferenceParams::Sine(SineLane::default())
    }
}
