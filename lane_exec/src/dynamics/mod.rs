//! # Vehicle dynamics module
//!
//! The dynamics advance an [`AbsoluteState`] by one control period under a
//! steering demand. Implementations must be pure functions of their inputs so
//! that independent rollouts can share one instance.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod vehicle;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::state::AbsoluteState;
pub use params::*;
pub use vehicle::*;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A discrete time vehicle model.
pub trait Dynamics: Send + Sync {
    /// Integrate one step from `state` under the steering demand `steer_rad`.
    fn step(&self, state: &AbsoluteState, steer_rad: f64) -> Result<StepOutput, DynamicsError>;

    /// Stage cost of being in `state` with the steering demand `steer_rad`.
    ///
    /// For relative states this is the tracking cost.
    fn stage_cost(&self, state: &AbsoluteState, steer_rad: f64) -> f64;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything computed by one integration step.
///
/// Only `next` is needed to advance a rollout, the remaining quantities are
/// kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutput {
    /// State at the end of the step
    pub next: AbsoluteState,

    /// Time derivative of the state at the start of the step
    pub derivative: AbsoluteState,

    /// Stage cost at the start of the step
    pub stage_cost: f64,

    /// Lateral force on the front axle
    pub front_force_n: f64,

    /// Lateral force on the rear axle
    pub rear_force_n: f64,

    /// Front axle slip angle
    pub front_slip_rad: f64,

    /// Rear axle slip angle
    pub rear_slip_rad: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while stepping the dynamics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DynamicsError {
    /// The state or control passed to the integrator, or the state it
    /// produced, contains NaN or infinite values.
    #[error("Non-finite value in dynamics step (state: {state:?}, steer: {steer_rad})")]
    NonFinite {
        state: AbsoluteState,
        steer_rad: f64,
    },
}
