//! # Lane keeping library.
//!
//! Closed loop simulation of lane keeping controllers on a single track vehicle model, and
//! comparison of how well each one tracks the lane.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Comparative analysis - tracking error series and summaries across controllers
pub mod analysis;

/// Controllers - learned policy, receding horizon optimiser and open-loop replay
pub mod ctrl;

/// Vehicle dynamics - single track model with a saturating tyre
pub mod dynamics;

/// Relative state transform - moves states between the ground and lane frames
pub mod frame;

/// Simulation parameters
pub mod params;

/// Rollout persistence - numeric tables of state, control and value histories
pub mod persist;

/// Reference trajectory - the lane centre line as a target state
pub mod reference;

/// Rollout engine - runs one controller in closed loop
pub mod rollout;

/// State types
pub mod state;
