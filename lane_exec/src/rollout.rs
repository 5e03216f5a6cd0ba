//! # Rollout engine
//!
//! Runs one controller in closed loop with the vehicle dynamics for a fixed
//! number of steps, recording the state, control and (for learned
//! controllers) value histories along with the time spent computing controls.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace};
use std::time::{Duration, Instant};

// Internal
use crate::{
    ctrl::{Controller, ControllerKind, CtrlError, Observation},
    dynamics::{Dynamics, DynamicsError},
    frame::RelativeStateTransform,
    reference::Reference,
    state::AbsoluteState,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drives controllers through the dynamics.
///
/// The engine holds no mutable state, one engine can run any number of
/// rollouts.
#[derive(Clone, Copy)]
pub struct RolloutEngine<'a> {
    transform: RelativeStateTransform<'a>,
}

/// The recorded histories of one closed loop run.
///
/// For a horizon of `N` steps there are `N + 1` states, `N` controls and, if
/// present, `N + 1` values. The first value is the estimate at the initial
/// state, value `i + 1` is the estimate at the state control `i` was computed
/// from, so the first two values are always equal.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollout {
    kind: ControllerKind,
    states: Vec<AbsoluteState>,
    controls: Vec<f64>,
    values: Option<Vec<f64>>,
    decision_time: Duration,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
    #[error("A rollout must have at least one step")]
    ZeroHorizon,

    #[error("Dynamics failed at step {step}: {source}")]
    Dynamics {
        step: usize,
        source: DynamicsError
    },

    #[error("Controller failed at step {step}: {source}")]
    Ctrl {
        step: usize,
        source: CtrlError
    },

    #[error("Controller cannot run this rollout: {0}")]
    Validation(CtrlError),

    #[error(
        "Inconsistent rollout histories: {states} states, {controls} controls, \
        {values:?} values"
    )]
    Inconsistent {
        states: usize,
        controls: usize,
        values: Option<usize>,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> RolloutEngine<'a> {
    pub fn new(dynamics: &'a dyn Dynamics, reference: &'a dyn Reference) -> Self {
        Self {
            transform: RelativeStateTransform::new(dynamics, reference),
        }
    }

    /// Run `controller` from `initial_state` for `horizon` steps.
    ///
    /// Only the time spent inside the controller counts towards the decision
    /// time. Any failure aborts the rollout.
    pub fn run(
        &self,
        controller: &Controller,
        initial_state: AbsoluteState,
        horizon: usize
    ) -> Result<Rollout, RolloutError> {
        if horizon == 0 {
            return Err(RolloutError::ZeroHorizon);
        }
        controller.validate(horizon).map_err(RolloutError::Validation)?;

        let kind = controller.kind();
        info!("Starting {} rollout of {} steps from {:?}", kind, horizon, initial_state);

        let mut state = initial_state;
        let mut state_r = self.transform.to_relative(&state);

        let mut states = Vec::with_capacity(horizon + 1);
        let mut controls = Vec::with_capacity(horizon);
        let mut values = controller.value(&state_r).map(|v| {
            let mut values = Vec::with_capacity(horizon + 1);
            values.push(v);
            values
        });
        let mut decision_time = Duration::default();

        states.push(state);

        for step in 0..horizon {
            let obs = Observation {
                step,
                relative: state_r,
                long_pos_m: state.long_pos_m,
            };

            let start = Instant::now();
            let steer_rad = controller
                .act(&obs)
                .map_err(|source| RolloutError::Ctrl { step, source })?;
            decision_time += start.elapsed();

            if let Some(values) = values.as_mut() {
                if let Some(v) = controller.value(&state_r) {
                    values.push(v);
                }
            }

            let (next, next_r) = self.transform
                .step(&state, &state_r, steer_rad)
                .map_err(|source| RolloutError::Dynamics { step, source })?;

            trace!("{} step {}: steer {:.6} rad", kind, step, steer_rad);

            state = next;
            state_r = next_r;
            states.push(state);
            controls.push(steer_rad);
        }

        info!(
            "{} rollout complete, decision time {}",
            kind,
            util::time::format_secs(decision_time)
        );

        Rollout::new(kind, states, controls, values, decision_time)
    }
}

impl Rollout {
    /// Assemble a rollout from its histories, checking their lengths agree.
    pub fn new(
        kind: ControllerKind,
        states: Vec<AbsoluteState>,
        controls: Vec<f64>,
        values: Option<Vec<f64>>,
        decision_time: Duration
    ) -> Result<Self, RolloutError> {
        let values_ok = values
            .as_ref()
            .map(|v| v.len() == states.len())
            .unwrap_or(true);

        if states.len() != controls.len() + 1 || !values_ok {
            return Err(RolloutError::Inconsistent {
                states: states.len(),
                controls: controls.len(),
                values: values.as_ref().map(|v| v.len()),
            });
        }

        Ok(Self {
            kind,
            states,
            controls,
            values,
            decision_time,
        })
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    /// Number of steps taken.
    pub fn horizon(&self) -> usize {
        self.controls.len()
    }

    pub fn states(&self) -> &[AbsoluteState] {
        &self.states
    }

    pub fn controls(&self) -> &[f64] {
        &self.controls
    }

    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    /// Total time spent computing controls.
    pub fn decision_time(&self) -> Duration {
        self.decision_time
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ctrl::OpenLoopController,
        dynamics::VehicleDynamics,
        reference::FlatLane,
    };

    #[test]
    fn test_lengths() {
        let dynamics = VehicleDynamics::default();
        let engine = RolloutEngine::new(&dynamics, &FlatLane);
        let ctrl = Controller::Precomputed(OpenLoopController::new(vec![0.01; 30]));

        let rollout = engine.run(&ctrl, AbsoluteState::default(), 25).unwrap();

        assert_eq!(rollout.kind(), ControllerKind::Precomputed);
        assert_eq!(rollout.horizon(), 25);
        assert_eq!(rollout.states().len(), 26);
        assert_eq!(rollout.controls().len(), 25);
        assert_eq!(rollout.values(), None);
        assert_eq!(rollout.states()[0], AbsoluteState::default());
    }

    #[test]
    fn test_zero_horizon() {
        let dynamics = VehicleDynamics::default();
        let engine = RolloutEngine::new(&dynamics, &FlatLane);
        let ctrl = Controller::Precomputed(OpenLoopController::new(vec![]));

        assert!(matches!(
            engine.run(&ctrl, AbsoluteState::default(), 0),
            Err(RolloutError::ZeroHorizon)
        ));
    }

    #[test]
    fn test_short_sequence_fails_before_stepping() {
        let dynamics = VehicleDynamics::default();
        let engine = RolloutEngine::new(&dynamics, &FlatLane);
        let ctrl = Controller::Precomputed(OpenLoopController::new(vec![0.0; 5]));

        assert!(matches!(
            engine.run(&ctrl, AbsoluteState::default(), 6),
            Err(RolloutError::Validation(CtrlError::LookupOutOfRange { horizon: 6, len: 5 }))
        ));
    }

    #[test]
    fn test_dynamics_failure_propagates() {
        let dynamics = VehicleDynamics::default();
        let engine = RolloutEngine::new(&dynamics, &FlatLane);
        let ctrl = Controller::Precomputed(OpenLoopController::new(vec![0.0, std::f64::NAN, 0.0]));

        assert!(matches!(
            engine.run(&ctrl, AbsoluteState::default(), 3),
            Err(RolloutError::Dynamics { step: 1, .. })
        ));
    }

    #[test]
    fn test_inconsistent_histories() {
        let states = vec![AbsoluteState::default(); 3];

        assert!(Rollout::new(
            ControllerKind::Learned,
            states.clone(),
            vec![0.0; 2],
            Some(vec![0.0; 3]),
            Duration::default()
        ).is_ok());
        assert!(matches!(
            Rollout::new(ControllerKind::Learned, states.clone(), vec![0.0; 3], None, Duration::default()),
            Err(RolloutError::Inconsistent { .. })
        ));
        assert!(matches!(
            Rollout::new(ControllerKind::Learned, states, vec![0.0; 2], Some(vec![0.0; 2]), Duration::default()),
            Err(RolloutError::Inconsistent { .. })
        ));
    }
}
