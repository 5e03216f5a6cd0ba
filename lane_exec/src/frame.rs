//! # Relative state transform
//!
//! Controllers act on the vehicle's deviation from the lane rather than on its
//! ground frame state. This module converts between the two frames and
//! advances both of them together across one step.
//!
//! Advancing is done with a three way split of the relative state components:
//!
//! 1. The ground frame state is integrated through the dynamics.
//! 2. The relative state is also integrated through the same dynamics, as if
//!    it were a ground frame state. The lateral velocity and yaw rate of the
//!    result are kept.
//! 3. The lateral position and heading are taken from the integrated ground
//!    frame state and the reference at the new longitudinal position is
//!    subtracted from them.
//!
//! Point 3 means the position-like components of the relative state are
//! always exactly `absolute - reference` and never drift, whatever the lane
//! curvature.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use crate::{
    dynamics::{Dynamics, DynamicsError},
    reference::Reference,
    state::{AbsoluteState, ReferenceState, RelativeState},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Converts and advances states between the ground and lane relative frames.
#[derive(Clone, Copy)]
pub struct RelativeStateTransform<'a> {
    dynamics: &'a dyn Dynamics,
    reference: &'a dyn Reference,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> RelativeStateTransform<'a> {
    pub fn new(dynamics: &'a dyn Dynamics, reference: &'a dyn Reference) -> Self {
        Self {
            dynamics,
            reference,
        }
    }

    /// Initial conversion of a ground frame state into the relative frame.
    ///
    /// All four components have the reference at the state's longitudinal
    /// position subtracted from them.
    pub fn to_relative(&self, state: &AbsoluteState) -> RelativeState {
        let reference = self.reference.at(state.long_pos_m);

        RelativeState::new(
            state.lat_pos_m - reference.lat_pos_m,
            state.lat_vel_ms - reference.lat_vel_ms,
            state.head_rad - reference.head_rad,
            state.yaw_rate_rads - reference.yaw_rate_rads
        )
    }

    /// Advance the ground frame state and its relative counterpart by one step
    /// under the steering demand `steer_rad`.
    pub fn step(
        &self,
        state: &AbsoluteState,
        state_r: &RelativeState,
        steer_rad: f64
    ) -> Result<(AbsoluteState, RelativeState), DynamicsError> {
        // Ground frame integration
        let state_next = self.dynamics.step(state, steer_rad)?.next;

        // Relative frame integration, the relative state is treated as a
        // ground frame state at the current longitudinal position.
        let raw_next = self.dynamics
            .step(&AbsoluteState::from_relative(state_r, state.long_pos_m), steer_rad)?
            .next;
        let raw_next = RelativeState::from_absolute_components(&raw_next);

        let reference_next = self.reference.at(state_next.long_pos_m);
        let state_r_next = merge_frames(&raw_next, &state_next, &reference_next);

        trace!(
            "x = {:.3} m: abs {:?}, rel {:?}",
            state_next.long_pos_m, state_next, state_r_next
        );

        Ok((state_next, state_r_next))
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the next relative state from the raw relative integration and the
/// integrated ground frame state.
///
/// - Lateral velocity and yaw rate come from `raw_relative` unchanged.
/// - Lateral position and heading come from `absolute_next`, minus the
///   reference evaluated at `absolute_next`'s longitudinal position.
pub fn merge_frames(
    raw_relative: &RelativeState,
    absolute_next: &AbsoluteState,
    reference_next: &ReferenceState
) -> RelativeState {
    RelativeState::new(
        absolute_next.lat_pos_m - reference_next.lat_pos_m,
        raw_relative.lat_vel_ms,
        absolute_next.head_rad - reference_next.head_rad,
        raw_relative.yaw_rate_rads
    )
}
