//! Vehicle dynamics parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the single track vehicle model
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct VehicleParams {
    /// Distance from the centre of gravity to the front axle
    pub front_axle_m: f64,

    /// Wheel base
    pub wheel_base_m: f64,

    /// Vehicle mass
    pub mass_kg: f64,

    /// Yaw moment of inertia
    pub yaw_inertia_kgm2: f64,

    /// Tyre model stiffness factor
    pub tyre_b: f64,

    /// Tyre model shape factor
    pub tyre_c: f64,

    /// Tyre model peak factor (friction coefficient)
    pub tyre_d: f64,

    /// Constant longitudinal speed
    pub speed_ms: f64,

    /// Gravitational acceleration
    pub gravity_ms2: f64,

    /// Control period
    pub period_s: f64,

    /// Stage cost weights
    pub cost: CostWeights,
}

/// Weights of the quadratic stage cost `w_y y^2 + w_psi psi^2 + w_u u^2`.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct CostWeights {
    pub lat_pos: f64,
    pub head: f64,
    pub steer: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleParams {
    /// Distance from the centre of gravity to the rear axle
    pub fn rear_axle_m(&self) -> f64 {
        self.wheel_base_m - self.front_axle_m
    }

    /// Vertical load on the front axle
    pub fn front_load_n(&self) -> f64 {
        self.mass_kg * self.gravity_ms2 * self.rear_axle_m() / self.wheel_base_m
    }

    /// Vertical load on the rear axle
    pub fn rear_load_n(&self) -> f64 {
        self.mass_kg * self.gravity_ms2 * self.front_axle_m / self.wheel_base_m
    }
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            front_axle_m: 1.14,
            wheel_base_m: 2.54,
            mass_kg: 1500.0,
            yaw_inertia_kgm2: 2420.0,
            tyre_b: 14.0,
            tyre_c: 1.43,
            tyre_d: 0.75,
            speed_ms: 15.0,
            gravity_ms2: 9.81,
            period_s: 0.1,
            cost: CostWeights::default(),
        }
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            lat_pos: 0.5,
            head: 0.25,
            steer: 0.25,
        }
    }
}
