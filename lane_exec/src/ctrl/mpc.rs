//! # Model predictive controller
//!
//! The optimiser plans a steering sequence over a finite horizon by iterative
//! LQR on the nonlinear vehicle dynamics:
//!
//! - the dynamics are linearised about the nominal trajectory by central
//!   differences,
//! - the tracking cost is approximated with a Gauss-Newton quadratic,
//! - a Riccati backward pass gives a feedforward step and feedback gain for
//!   every step of the horizon, with the steering box constraint handled
//!   exactly since the control is scalar,
//! - a backtracking forward pass applies the update to the true dynamics.
//!
//! The value Hessian is damped Levenberg-Marquardt style. Damping is raised
//! whenever the backward pass is ill conditioned or the forward pass finds
//! no descent, and relaxed after every accepted step.
//!
//! Every solve starts from the zero control sequence, so the result depends
//! only on the arguments.
//!
//! The receding horizon [`MpcController`] applies only the first control of
//! each plan.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use nalgebra::{Matrix2, Matrix2x5, Matrix5, Vector2, Vector5};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Internal
use super::{CtrlError, Observation};
use crate::{
    dynamics::{CostWeights, Dynamics, DynamicsError},
    reference::Reference,
    state::{AbsoluteState, RelativeState, ABS_STATE_DIM},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of times the step is halved in the forward pass before the
/// regularisation is raised instead.
const MAX_LINE_SEARCH_HALVINGS: i32 = 10;

/// Growth rate of the regularisation scaling factor.
const REG_FACTOR: f64 = 1.6;

/// Smallest non-zero regularisation, anything below is treated as zero.
const REG_MIN: f64 = 1e-6;

/// Regularisation beyond which no descent direction is expected.
const REG_MAX: f64 = 1e10;

/// Convergence is only accepted below this regularisation, since larger
/// values shrink the step regardless of how far from optimal the plan is.
const REG_CONVERGED: f64 = 1e-5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Optimiser parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpcParams {
    /// Receding horizon length in steps
    pub horizon: usize,

    /// Symmetric steering limit
    pub steer_limit_rad: f64,

    /// Maximum number of iterations before the solve is abandoned
    pub max_iterations: usize,

    /// Expected cost decrease of a full step, relative to the current cost,
    /// below which the solve has converged
    pub tolerance: f64,

    /// Mean control update, relative to the control magnitude, below which the
    /// solve has converged
    pub gradient_tolerance: f64,

    /// Perturbation used for the finite difference derivatives
    pub fd_step: f64,
}

/// Finite horizon trajectory optimiser.
#[derive(Clone)]
pub struct MpcSolver {
    params: MpcParams,
    weights: CostWeights,
    dynamics: Arc<dyn Dynamics>,
    reference: Arc<dyn Reference>,
}

/// The result of a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Predicted ground frame states, starting with the initial state, so one
    /// longer than `controls`
    pub states: Vec<AbsoluteState>,

    /// Planned steering demands
    pub controls: Vec<f64>,

    /// Tracking cost of the plan
    pub cost: f64,

    /// Number of iterations taken
    pub iterations: usize,
}

/// Receding horizon controller.
#[derive(Clone)]
pub struct MpcController {
    solver: MpcSolver,
    horizon: usize,
}

/// Affine control law for one step, `du = feedforward + feedback . dx`.
#[derive(Debug, Clone, Copy)]
struct Gain {
    feedforward: f64,
    feedback: Vector5<f64>,
}

/// Gains from one backward pass with the terms of the quadratic model of the
/// cost change along the step.
#[derive(Debug)]
struct BackwardPass {
    gains: Vec<Gain>,

    /// Sum of `k * Q_u`
    linear: f64,

    /// Sum of `k^2 * Q_uu / 2`
    quadratic: f64,

    /// Mean of `|k| / (|u| + 1)`
    step_norm: f64,
}

/// Levenberg-Marquardt damping of the value Hessian.
#[derive(Debug, Clone, Copy)]
struct Regularisation {
    mu: f64,
    factor: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MpcError {
    #[error("The optimiser did not converge within {iterations} iterations")]
    NotConverged {
        iterations: usize
    },

    #[error("No descent direction found after {iterations} iterations")]
    NoDescent {
        iterations: usize
    },

    #[error("The cost of the trajectory is not finite")]
    NonFiniteCost,

    #[error("The optimisation horizon must be at least one step")]
    InvalidHorizon,

    #[error("The control Hessian is not positive at step {step}")]
    IllConditioned {
        step: usize
    },

    #[error("Prediction failed: {0}")]
    Dynamics(#[from] DynamicsError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MpcParams {
    fn default() -> Self {
        Self {
            horizon: 50,
            steer_limit_rad: 0.35,
            max_iterations: 300,
            tolerance: 1e-6,
            gradient_tolerance: 1e-5,
            fd_step: 1e-6,
        }
    }
}

impl BackwardPass {
    /// Cost reduction predicted by the quadratic model for step size `alpha`.
    fn expected_decrease(&self, alpha: f64) -> f64 {
        -(alpha * self.linear + alpha * alpha * self.quadratic)
    }
}

impl Regularisation {
    fn new() -> Self {
        Self {
            mu: 0.0,
            factor: 1.0,
        }
    }

    /// Returns false once the damping exceeds `REG_MAX`.
    fn increase(&mut self) -> bool {
        self.factor = (self.factor * REG_FACTOR).max(REG_FACTOR);
        self.mu = (self.mu * self.factor).max(REG_MIN);
        self.mu <= REG_MAX
    }

    fn decrease(&mut self) {
        self.factor = (self.factor / REG_FACTOR).min(1.0 / REG_FACTOR);
        self.mu *= self.factor;
        if self.mu < REG_MIN {
            self.mu = 0.0;
        }
    }
}

impl MpcSolver {
    pub fn new(
        params: MpcParams,
        weights: CostWeights,
        dynamics: Arc<dyn Dynamics>,
        reference: Arc<dyn Reference>
    ) -> Self {
        Self {
            params,
            weights,
            dynamics,
            reference,
        }
    }

    /// Plan from a relative state at the given longitudinal position.
    ///
    /// The relative state is placed back onto the reference at `long_pos_m`
    /// to recover the ground frame state the prediction starts from.
    pub fn solve(
        &self,
        relative: &RelativeState,
        long_pos_m: f64,
        horizon: usize
    ) -> Result<Plan, MpcError> {
        let reference = self.reference.at(long_pos_m);

        let x0 = AbsoluteState::new(
            relative.lat_pos_m + reference.lat_pos_m,
            relative.lat_vel_ms + reference.lat_vel_ms,
            relative.head_rad + reference.head_rad,
            relative.yaw_rate_rads + reference.yaw_rate_rads,
            long_pos_m
        );

        self.solve_absolute(&x0, horizon)
    }

    /// Plan from a ground frame state.
    ///
    /// The solve has converged when, with negligible regularisation, either
    /// the full step is small compared to the controls or the cost decrease
    /// it predicts is below `tolerance` of the current cost. A forward pass
    /// that finds no descent raises the regularisation and retries.
    pub fn solve_absolute(&self, x0: &AbsoluteState, horizon: usize) -> Result<Plan, MpcError> {
        if horizon == 0 {
            return Err(MpcError::InvalidHorizon);
        }

        let mut controls = vec![0.0; horizon];
        let mut states = self.simulate(x0, &controls)?;
        let mut cost = self.trajectory_cost(&states, &controls);

        if !cost.is_finite() {
            return Err(MpcError::NonFiniteCost);
        }

        let mut reg = Regularisation::new();

        for iteration in 1..=self.params.max_iterations {
            let backward = match self.backward_pass(&states, &controls, reg.mu) {
                Ok(b) => b,
                Err(MpcError::IllConditioned { step }) => {
                    trace!("Iteration {}: Q_uu not positive at step {}", iteration, step);
                    if !reg.increase() {
                        return Err(MpcError::IllConditioned { step });
                    }
                    continue;
                },
                Err(e) => return Err(e),
            };

            let full_decrease = backward.expected_decrease(1.0);
            if reg.mu < REG_CONVERGED
                && (backward.step_norm < self.params.gradient_tolerance
                    || full_decrease <= self.params.tolerance * cost)
            {
                debug!(
                    "Converged after {} iterations, cost {:.6e}, step norm {:.3e}",
                    iteration, cost, backward.step_norm
                );
                return Ok(Plan {
                    states,
                    controls,
                    cost,
                    iterations: iteration,
                });
            }

            let mut accepted = None;
            for halvings in 0..=MAX_LINE_SEARCH_HALVINGS {
                let alpha = 0.5f64.powi(halvings);
                let (s, c) = match self.forward_pass(x0, &states, &controls, &backward.gains, alpha) {
                    Ok(t) => t,
                    // A step large enough to break the model is just rejected
                    Err(MpcError::Dynamics(_)) => continue,
                    Err(e) => return Err(e),
                };
                let new_cost = self.trajectory_cost(&s, &c);

                if new_cost.is_finite() && new_cost < cost {
                    accepted = Some((s, c, new_cost, alpha));
                    break;
                }
            }

            match accepted {
                Some((s, c, new_cost, alpha)) => {
                    trace!(
                        "Iteration {}: cost {:.6e} -> {:.6e} (alpha {}, expected {:.3e}, mu {:.1e})",
                        iteration, cost, new_cost, alpha,
                        backward.expected_decrease(alpha), reg.mu
                    );

                    states = s;
                    controls = c;
                    cost = new_cost;
                    reg.decrease();
                },
                None => {
                    if !reg.increase() {
                        debug!("No descent after {} iterations, cost {:.6e}", iteration, cost);
                        return Err(MpcError::NoDescent {
                            iterations: iteration,
                        });
                    }
                    trace!("Iteration {}: no descent, mu raised to {:.1e}", iteration, reg.mu);
                },
            }
        }

        Err(MpcError::NotConverged {
            iterations: self.params.max_iterations,
        })
    }

    /// Tracking cost of applying `controls` from `x0`.
    pub fn evaluate(&self, x0: &AbsoluteState, controls: &[f64]) -> Result<f64, MpcError> {
        let states = self.simulate(x0, controls)?;
        Ok(self.trajectory_cost(&states, controls))
    }

    /// Propagate the dynamics from `x0` under `controls`.
    fn simulate(&self, x0: &AbsoluteState, controls: &[f64]) -> Result<Vec<AbsoluteState>, MpcError> {
        let mut states = Vec::with_capacity(controls.len() + 1);
        states.push(*x0);

        let mut x = *x0;
        for u in controls {
            x = self.dynamics.step(&x, *u)?.next;
            states.push(x);
        }

        Ok(states)
    }

    /// Tracking residual `(y - y_ref, psi - psi_ref)` and its Jacobian with
    /// respect to the ground frame state.
    fn residual(&self, x: &AbsoluteState) -> (Vector2<f64>, Matrix2x5<f64>) {
        let h = self.params.fd_step;
        let r = self.reference.at(x.long_pos_m);
        let r_plus = self.reference.at(x.long_pos_m + h);
        let r_minus = self.reference.at(x.long_pos_m - h);

        let dy_dx = (r_plus.lat_pos_m - r_minus.lat_pos_m) / (2.0 * h);
        let dpsi_dx = (r_plus.head_rad - r_minus.head_rad) / (2.0 * h);

        let residual = Vector2::new(x.lat_pos_m - r.lat_pos_m, x.head_rad - r.head_rad);

        #[rustfmt::skip]
        let jacobian = Matrix2x5::new(
            1.0, 0.0, 0.0, 0.0, -dy_dx,
            0.0, 0.0, 1.0, 0.0, -dpsi_dx,
        );

        (residual, jacobian)
    }

    fn residual_weights(&self) -> Matrix2<f64> {
        Matrix2::from_diagonal(&Vector2::new(self.weights.lat_pos, self.weights.head))
    }

    fn state_cost(&self, x: &AbsoluteState) -> f64 {
        let r = self.reference.at(x.long_pos_m);
        self.weights.lat_pos * (x.lat_pos_m - r.lat_pos_m).powi(2)
            + self.weights.head * (x.head_rad - r.head_rad).powi(2)
    }

    /// Gauss-Newton gradient and Hessian of the state cost.
    fn state_cost_derivatives(&self, x: &AbsoluteState) -> (Vector5<f64>, Matrix5<f64>) {
        let (r, j) = self.residual(x);
        let w = self.residual_weights();

        (
            2.0 * j.transpose() * w * r,
            2.0 * j.transpose() * w * j
        )
    }

    fn trajectory_cost(&self, states: &[AbsoluteState], controls: &[f64]) -> f64 {
        let control_cost: f64 = controls
            .iter()
            .map(|u| self.weights.steer * u * u)
            .sum();
        let state_cost: f64 = states
            .iter()
            .skip(1)
            .map(|x| self.state_cost(x))
            .sum();

        control_cost + state_cost
    }

    /// Central difference Jacobians of the dynamics about `(x, u)`.
    fn linearise(&self, x: &AbsoluteState, u: f64) -> Result<(Matrix5<f64>, Vector5<f64>), MpcError> {
        let h = self.params.fd_step;
        let xv = x.to_vector();
        let mut a = Matrix5::zeros();

        for i in 0..ABS_STATE_DIM {
            let mut x_plus = xv;
            let mut x_minus = xv;
            x_plus[i] += h;
            x_minus[i] -= h;

            let f_plus = self.dynamics.step(&AbsoluteState::from_vector(&x_plus), u)?.next;
            let f_minus = self.dynamics.step(&AbsoluteState::from_vector(&x_minus), u)?.next;

            a.set_column(i, &((f_plus.to_vector() - f_minus.to_vector()) / (2.0 * h)));
        }

        let f_plus = self.dynamics.step(x, u + h)?.next;
        let f_minus = self.dynamics.step(x, u - h)?.next;
        let b = (f_plus.to_vector() - f_minus.to_vector()) / (2.0 * h);

        Ok((a, b))
    }

    /// Riccati recursion with `mu` added to the value Hessian wherever it
    /// shapes the gains.
    fn backward_pass(
        &self,
        states: &[AbsoluteState],
        controls: &[f64],
        mu: f64
    ) -> Result<BackwardPass, MpcError> {
        let n = controls.len();
        let limit = self.params.steer_limit_rad;

        let (mut v_x, mut v_xx) = self.state_cost_derivatives(&states[n]);
        let mut gains = Vec::with_capacity(n);
        let mut linear = 0.0;
        let mut quadratic = 0.0;
        let mut step_norm = 0.0;

        for k in (0..n).rev() {
            let u = controls[k];
            let (a, b) = self.linearise(&states[k], u)?;

            // The initial state is fixed so it carries no cost
            let (l_x, l_xx) = if k > 0 {
                self.state_cost_derivatives(&states[k])
            }
            else {
                (Vector5::zeros(), Matrix5::zeros())
            };

            let v_xx_b = v_xx * b;
            let q_x = l_x + a.transpose() * v_x;
            let q_u = 2.0 * self.weights.steer * u + b.dot(&v_x);
            let q_xx = l_xx + a.transpose() * v_xx * a;
            let q_uu = 2.0 * self.weights.steer + b.dot(&v_xx_b);
            let q_ux = a.transpose() * v_xx_b;

            let q_uu_reg = q_uu + mu * b.dot(&b);
            let q_ux_reg = q_ux + mu * (a.transpose() * b);

            if !(q_uu_reg > 0.0) || !q_uu_reg.is_finite() {
                return Err(MpcError::IllConditioned { step: k });
            }

            // Scalar box QP: the unconstrained step clamped into the limits.
            // A clamped step means the control sits on the bound, so it gets
            // no feedback.
            let unclamped = -q_u / q_uu_reg;
            let feedforward = unclamped.max(-limit - u).min(limit - u);
            let feedback = if feedforward == unclamped {
                -q_ux_reg / q_uu_reg
            }
            else {
                Vector5::zeros()
            };

            linear += feedforward * q_u;
            quadratic += 0.5 * feedforward * feedforward * q_uu_reg;
            step_norm += feedforward.abs() / (u.abs() + 1.0);

            v_x = q_x
                + feedback * (q_uu * feedforward)
                + feedback * q_u
                + q_ux * feedforward;
            v_xx = q_xx
                + feedback * feedback.transpose() * q_uu
                + feedback * q_ux.transpose()
                + q_ux * feedback.transpose();
            v_xx = 0.5 * (v_xx + v_xx.transpose());

            gains.push(Gain {
                feedforward,
                feedback,
            });
        }

        gains.reverse();

        Ok(BackwardPass {
            gains,
            linear,
            quadratic,
            step_norm: step_norm / n as f64,
        })
    }

    fn forward_pass(
        &self,
        x0: &AbsoluteState,
        states: &[AbsoluteState],
        controls: &[f64],
        gains: &[Gain],
        alpha: f64
    ) -> Result<(Vec<AbsoluteState>, Vec<f64>), MpcError> {
        let limit = self.params.steer_limit_rad;
        let mut new_states = Vec::with_capacity(states.len());
        let mut new_controls = Vec::with_capacity(controls.len());

        let mut x = *x0;
        new_states.push(x);

        for ((nominal_x, nominal_u), gain) in states.iter().zip(controls).zip(gains) {
            let dx = x.to_vector() - nominal_x.to_vector();
            let u = (nominal_u + alpha * gain.feedforward + gain.feedback.dot(&dx))
                .max(-limit)
                .min(limit);

            x = self.dynamics.step(&x, u)?.next;
            new_states.push(x);
            new_controls.push(u);
        }

        Ok((new_states, new_controls))
    }
}

impl MpcController {
    pub fn new(solver: MpcSolver) -> Self {
        Self {
            horizon: solver.params.horizon,
            solver,
        }
    }

    /// Solve over the receding horizon and return the first planned control.
    pub fn act(&self, obs: &Observation) -> Result<f64, CtrlError> {
        let plan = self.solver.solve(&obs.relative, obs.long_pos_m, self.horizon)?;

        trace!(
            "Step {}: MPC plan cost {:.6e} in {} iterations",
            obs.step, plan.cost, plan.iterations
        );

        plan.controls
            .first()
            .copied()
            .ok_or(CtrlError::Optimisation(MpcError::InvalidHorizon))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dynamics::{VehicleDynamics, VehicleParams},
        frame::RelativeStateTransform,
        params::SimParams,
        reference::{FlatLane, SineLane},
    };

    fn solver(params: MpcParams, reference: Arc<dyn Reference>) -> MpcSolver {
        let vehicle = VehicleParams::default();
        MpcSolver::new(
            params,
            vehicle.cost,
            Arc::new(VehicleDynamics::new(vehicle)),
            reference
        )
    }

    fn short_horizon() -> MpcParams {
        MpcParams {
            horizon: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_on_lane_needs_no_control() {
        let s = solver(short_horizon(), Arc::new(FlatLane));

        let plan = s.solve(&RelativeState::default(), 0.0, 20).unwrap();

        assert_eq!(plan.states.len(), 21);
        assert_eq!(plan.controls.len(), 20);
        assert!(plan.controls.iter().all(|u| *u == 0.0));
        assert_eq!(plan.cost, 0.0);
        assert_eq!(plan.iterations, 1);
    }

    #[test]
    fn test_steers_back_to_lane() {
        let s = solver(short_horizon(), Arc::new(FlatLane));
        let offset = RelativeState::new(0.5, 0.0, 0.0, 0.0);

        let plan = s.solve(&offset, 0.0, 20).unwrap();

        // Vehicle is left of the lane so it must initially steer right
        assert!(plan.controls[0] < 0.0);

        let uncontrolled = s.trajectory_cost(&s.simulate(&plan.states[0], &[0.0; 20]).unwrap(), &[0.0; 20]);
        assert!(plan.cost < uncontrolled);

        // The prediction ends closer to the lane than it started
        let end = plan.states.last().unwrap();
        assert!(end.lat_pos_m.abs() < 0.5);
    }

    #[test]
    fn test_steer_limit() {
        let params = MpcParams {
            steer_limit_rad: 0.02,
            max_iterations: 500,
            ..short_horizon()
        };
        let s = solver(params, Arc::new(FlatLane));

        let plan = s.solve(&RelativeState::new(3.0, 0.0, 0.0, 0.0), 0.0, 20).unwrap();

        assert!(plan.controls.iter().all(|u| u.abs() <= 0.02));
        assert!(plan.controls.iter().any(|u| *u == -0.02));
    }

    #[test]
    fn test_invalid_horizon() {
        let s = solver(short_horizon(), Arc::new(FlatLane));

        assert_eq!(
            s.solve(&RelativeState::default(), 0.0, 0),
            Err(MpcError::InvalidHorizon)
        );
    }

    #[test]
    fn test_not_converged() {
        let params = MpcParams {
            max_iterations: 1,
            ..short_horizon()
        };
        let s = solver(params, Arc::new(FlatLane));

        assert_eq!(
            s.solve(&RelativeState::new(1.0, 0.0, 0.0, 0.0), 0.0, 20),
            Err(MpcError::NotConverged { iterations: 1 })
        );
    }

    #[test]
    fn test_deterministic() {
        let s = solver(short_horizon(), Arc::new(SineLane::default()));
        let rel = RelativeState::new(0.2, 0.05, -0.02, 0.01);

        assert_eq!(s.solve(&rel, 12.0, 20), s.solve(&rel, 12.0, 20));
    }

    #[test]
    fn test_relative_is_anchored_on_reference() {
        let lane = SineLane::default();
        let s = solver(short_horizon(), Arc::new(lane));

        let long_pos_m = 7.5;
        let r = lane.at(long_pos_m);
        let rel = RelativeState::new(0.1, 0.0, 0.02, 0.0);
        let abs = AbsoluteState::new(
            0.1 + r.lat_pos_m,
            0.0,
            0.02 + r.head_rad,
            0.0,
            long_pos_m
        );

        assert_eq!(s.solve(&rel, long_pos_m, 20), s.solve_absolute(&abs, 20));
    }

    #[test]
    fn test_controller_uses_first_control() {
        let s = solver(short_horizon(), Arc::new(FlatLane));
        let ctrl = MpcController::new(s.clone());
        let obs = Observation {
            step: 3,
            relative: RelativeState::new(0.3, 0.0, 0.0, 0.0),
            long_pos_m: 40.0,
        };

        let plan = s.solve(&obs.relative, obs.long_pos_m, 20).unwrap();
        assert_eq!(ctrl.act(&obs).unwrap(), plan.controls[0]);
    }

    #[test]
    fn test_regularisation_schedule() {
        let mut reg = Regularisation::new();
        assert_eq!(reg.mu, 0.0);

        assert!(reg.increase());
        assert_eq!(reg.mu, REG_MIN);

        reg.decrease();
        assert_eq!(reg.mu, 0.0);

        let mut raised = 0;
        while reg.increase() {
            raised += 1;
            assert!(raised < 1000);
        }
        assert!(reg.mu > REG_MAX);
    }

    #[test]
    fn test_default_configuration_solves() {
        let params = SimParams::default();
        let dynamics: Arc<dyn Dynamics> = Arc::new(VehicleDynamics::new(params.vehicle.clone()));
        let reference: Arc<dyn Reference> = Arc::from(params.lane.build());
        let s = MpcSolver::new(params.mpc, params.vehicle.cost, dynamics.clone(), reference.clone());
        let s0 = params.initial_state();

        // Open-loop plan over the full run
        let plan = s.solve_absolute(&s0, params.open_loop.steps).unwrap();

        assert_eq!(plan.controls.len(), params.open_loop.steps);
        assert!(plan.controls.iter().all(|u| u.abs() <= params.mpc.steer_limit_rad));
        assert!(plan.cost < s.evaluate(&s0, &vec![0.0; params.open_loop.steps]).unwrap());

        // First receding horizon decision
        let transform = RelativeStateTransform::new(&*dynamics, &*reference);
        let ctrl = MpcController::new(s);
        let obs = Observation {
            step: 0,
            relative: transform.to_relative(&s0),
            long_pos_m: s0.long_pos_m,
        };

        let u = ctrl.act(&obs).unwrap();
        assert!(u.abs() <= params.mpc.steer_limit_rad);
    }

    #[test]
    fn test_plan_is_locally_optimal() {
        let lane = SineLane::default();
        let s = solver(MpcParams::default(), Arc::new(lane));
        let s0 = AbsoluteState::new(0.0, 0.0, lane.initial_heading_rad(), 0.0, 0.0);
        let horizon = 100;

        let plan = s.solve_absolute(&s0, horizon).unwrap();
        assert_eq!(s.evaluate(&s0, &plan.controls).unwrap(), plan.cost);

        // No single feasible change of one control does better
        let limit = MpcParams::default().steer_limit_rad;
        for k in [0, 1, 25, 50, 75, horizon - 1] {
            for delta in [-0.01, 0.01] {
                let mut controls = plan.controls.clone();
                controls[k] = (controls[k] + delta).max(-limit).min(limit);

                assert!(
                    s.evaluate(&s0, &controls).unwrap() >= plan.cost,
                    "changing control {} by {} lowers the cost", k, delta
                );
            }
        }
    }
}
