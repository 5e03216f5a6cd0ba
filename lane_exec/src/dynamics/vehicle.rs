//! # Single track vehicle model
//!
//! Constant longitudinal speed bicycle model with a saturating tyre,
//! `F_y = -D sin(C atan(B alpha)) F_z`, integrated with forward Euler.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{Dynamics, DynamicsError, StepOutput, VehicleParams};
use crate::state::AbsoluteState;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The vehicle dynamics.
///
/// Holds only immutable parameters, every call to [`Dynamics::step`] is a pure
/// function of its arguments.
#[derive(Debug, Clone)]
pub struct VehicleDynamics {
    params: VehicleParams,

    /// Cached axle loads
    front_load_n: f64,
    rear_load_n: f64,
}

/// Continuous time derivative plus the tyre quantities used to compute it.
struct Derivative {
    state: AbsoluteState,
    front_force_n: f64,
    rear_force_n: f64,
    front_slip_rad: f64,
    rear_slip_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleDynamics {
    pub fn new(params: VehicleParams) -> Self {
        Self {
            front_load_n: params.front_load_n(),
            rear_load_n: params.rear_load_n(),
            params,
        }
    }

    /// Lateral tyre force for the given slip angle and vertical load.
    fn tyre_force_n(&self, slip_rad: f64, load_n: f64) -> f64 {
        let p = &self.params;
        -p.tyre_d * (p.tyre_c * (p.tyre_b * slip_rad).atan()).sin() * load_n
    }

    fn derivative(&self, s: &AbsoluteState, steer_rad: f64) -> Derivative {
        let p = &self.params;
        let u = p.speed_ms;
        let a = p.front_axle_m;
        let b = p.rear_axle_m();

        // Body slip angle
        let beta = s.lat_vel_ms / u;

        let front_slip_rad = -steer_rad + beta + a * s.yaw_rate_rads / u;
        let rear_slip_rad = beta - b * s.yaw_rate_rads / u;

        let front_force_n = self.tyre_force_n(front_slip_rad, self.front_load_n);
        let rear_force_n = self.tyre_force_n(rear_slip_rad, self.rear_load_n);

        let (sin_psi, cos_psi) = s.head_rad.sin_cos();
        let cos_delta = steer_rad.cos();

        let state = AbsoluteState::new(
            u * sin_psi + s.lat_vel_ms * cos_psi,
            (front_force_n * cos_delta + rear_force_n) / p.mass_kg - u * s.yaw_rate_rads,
            s.yaw_rate_rads,
            (a * front_force_n * cos_delta - b * rear_force_n) / p.yaw_inertia_kgm2,
            u * cos_psi - s.lat_vel_ms * sin_psi
        );

        Derivative {
            state,
            front_force_n,
            rear_force_n,
            front_slip_rad,
            rear_slip_rad,
        }
    }
}

impl Dynamics for VehicleDynamics {
    fn step(&self, state: &AbsoluteState, steer_rad: f64) -> Result<StepOutput, DynamicsError> {
        if !state.is_finite() || !steer_rad.is_finite() {
            return Err(DynamicsError::NonFinite {
                state: *state,
                steer_rad,
            });
        }

        let deriv = self.derivative(state, steer_rad);

        let next = AbsoluteState::from_vector(
            &(state.to_vector() + deriv.state.to_vector() * self.params.period_s)
        );

        if !next.is_finite() {
            return Err(DynamicsError::NonFinite {
                state: next,
                steer_rad,
            });
        }

        Ok(StepOutput {
            next,
            derivative: deriv.state,
            stage_cost: self.stage_cost(state, steer_rad),
            front_force_n: deriv.front_force_n,
            rear_force_n: deriv.rear_force_n,
            front_slip_rad: deriv.front_slip_rad,
            rear_slip_rad: deriv.rear_slip_rad,
        })
    }

    fn stage_cost(&self, state: &AbsoluteState, steer_rad: f64) -> f64 {
        let w = &self.params.cost;
        w.lat_pos * state.lat_pos_m.powi(2)
            + w.head * state.head_rad.powi(2)
            + w.steer * steer_rad.powi(2)
    }
}

impl Default for VehicleDynamics {
    fn default() -> Self {
        Self::new(VehicleParams::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_straight_line() {
        let dynamics = VehicleDynamics::default();
        let state = AbsoluteState::new(0.0, 0.0, 0.0, 0.0, 10.0);

        let out = dynamics.step(&state, 0.0).unwrap();

        // No slip, no forces, just longitudinal motion at the set speed
        assert_abs_diff_eq!(out.front_force_n, 0.0);
        assert_abs_diff_eq!(out.rear_force_n, 0.0);
        assert_abs_diff_eq!(out.next.lat_pos_m, 0.0);
        assert_abs_diff_eq!(out.next.long_pos_m, 11.5, epsilon = 1e-12);
        assert_abs_diff_eq!(out.stage_cost, 0.0);
    }

    #[test]
    fn test_steer_left_turns_left() {
        let dynamics = VehicleDynamics::default();
        let state = AbsoluteState::default();

        let out = dynamics.step(&state, 0.05).unwrap();

        // Positive steer gives a negative front slip, positive lateral force
        // and positive yaw acceleration.
        assert!(out.front_slip_rad < 0.0);
        assert!(out.front_force_n > 0.0);
        assert!(out.derivative.yaw_rate_rads > 0.0);
        assert!(out.next.yaw_rate_rads > 0.0);
        assert!(out.next.lat_vel_ms > 0.0);
    }

    #[test]
    fn test_step_is_pure() {
        let dynamics = VehicleDynamics::default();
        let state = AbsoluteState::new(0.3, -0.1, 0.02, 0.05, 7.0);

        assert_eq!(dynamics.step(&state, 0.01), dynamics.step(&state, 0.01));
    }

    #[test]
    fn test_non_finite_rejected() {
        let dynamics = VehicleDynamics::default();

        assert!(matches!(
            dynamics.step(&AbsoluteState::default(), std::f64::NAN),
            Err(DynamicsError::NonFinite { .. })
        ));
        assert!(matches!(
            dynamics.step(
                &AbsoluteState::new(std::f64::INFINITY, 0.0, 0.0, 0.0, 0.0),
                0.0
            ),
            Err(DynamicsError::NonFinite { .. })
        ));
    }
}
