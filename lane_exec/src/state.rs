//! # Vehicle state types
//!
//! Three closely related 4/5 component states are used by the simulation and
//! they must never be mixed up:
//!
//! - [`AbsoluteState`] is the vehicle state in the ground frame, including
//!   the longitudinal position which indexes progress along the lane.
//! - [`ReferenceState`] is the lane's target state at a longitudinal position.
//! - [`RelativeState`] is the deviation of the vehicle from the reference at
//!   its current longitudinal position. This is what controllers see.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector5;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of components in an absolute state.
pub const ABS_STATE_DIM: usize = 5;

/// Number of components in relative and reference states.
pub const REL_STATE_DIM: usize = 4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Vehicle state in the ground frame.
///
/// The component order is fixed and is used for the archived tables:
/// `(lat_pos_m, lat_vel_ms, head_rad, yaw_rate_rads, long_pos_m)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AbsoluteState {
    /// Lateral position
    pub lat_pos_m: f64,

    /// Lateral velocity in the body frame
    pub lat_vel_ms: f64,

    /// Heading angle
    pub head_rad: f64,

    /// Yaw rate
    pub yaw_rate_rads: f64,

    /// Longitudinal position. Non-decreasing over a rollout.
    pub long_pos_m: f64,
}

/// Deviation of the vehicle from the reference at its current longitudinal
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RelativeState {
    pub lat_pos_m: f64,
    pub lat_vel_ms: f64,
    pub head_rad: f64,
    pub yaw_rate_rads: f64,
}

/// Target state of the lane at a longitudinal position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferenceState {
    pub lat_pos_m: f64,
    pub lat_vel_ms: f64,
    pub head_rad: f64,
    pub yaw_rate_rads: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AbsoluteState {
    pub fn new(
        lat_pos_m: f64,
        lat_vel_ms: f64,
        head_rad: f64,
        yaw_rate_rads: f64,
        long_pos_m: f64
    ) -> Self {
        Self {
            lat_pos_m,
            lat_vel_ms,
            head_rad,
            yaw_rate_rads,
            long_pos_m,
        }
    }

    /// Row representation in archive column order.
    pub fn to_row(&self) -> [f64; ABS_STATE_DIM] {
        [
            self.lat_pos_m,
            self.lat_vel_ms,
            self.head_rad,
            self.yaw_rate_rads,
            self.long_pos_m,
        ]
    }

    /// Build a state from a row in archive column order, or `None` if the row
    /// has the wrong number of columns.
    pub fn from_row(row: &[f64]) -> Option<Self> {
        match *row {
            [y, v, psi, omega, x] => Some(Self::new(y, v, psi, omega, x)),
            _ => None,
        }
    }

    pub fn to_vector(&self) -> Vector5<f64> {
        Vector5::from(self.to_row())
    }

    pub fn from_vector(v: &Vector5<f64>) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4])
    }

    pub fn is_finite(&self) -> bool {
        self.to_row().iter().all(|v| v.is_finite())
    }

    /// Treat a relative state as if it were a ground frame state at the given
    /// longitudinal position.
    ///
    /// This is only meaningful for integrating the relative state through the
    /// vehicle dynamics, see [`crate::frame`].
    pub fn from_relative(rel: &RelativeState, long_pos_m: f64) -> Self {
        Self::new(
            rel.lat_pos_m,
            rel.lat_vel_ms,
            rel.head_rad,
            rel.yaw_rate_rads,
            long_pos_m
        )
    }
}

impl RelativeState {
    pub fn new(lat_pos_m: f64, lat_vel_ms: f64, head_rad: f64, yaw_rate_rads: f64) -> Self {
        Self {
            lat_pos_m,
            lat_vel_ms,
            head_rad,
            yaw_rate_rads,
        }
    }

    pub fn to_array(&self) -> [f64; REL_STATE_DIM] {
        [self.lat_pos_m, self.lat_vel_ms, self.head_rad, self.yaw_rate_rads]
    }

    /// First four components of an absolute state, dropping the longitudinal
    /// position.
    pub fn from_absolute_components(abs: &AbsoluteState) -> Self {
        Self::new(abs.lat_pos_m, abs.lat_vel_ms, abs.head_rad, abs.yaw_rate_rads)
    }
}

impl ReferenceState {
    pub fn new(lat_pos_m: f64, lat_vel_ms: f64, head_rad: f64, yaw_rate_rads: f64) -> Self {
        Self {
            lat_pos_m,
            lat_vel_ms,
            head_rad,
            yaw_rate_rads,
        }
    }
}
