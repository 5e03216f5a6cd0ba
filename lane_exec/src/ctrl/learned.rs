//! # Learned controller
//!
//! The learned controller is a pair of small multilayer perceptrons trained
//! offline, an actor giving the steering demand and a critic giving the value
//! estimate, both acting on the relative state. Training is done elsewhere,
//! this module only evaluates networks loaded from JSON parameter files.
//!
//! The parameter file format is:
//!
//! ```json
//! {
//!     "input_scale": [1.0, 1.0, 1.0, 1.0],
//!     "output_gain": 1.0,
//!     "layers": [
//!         { "weights": [[...], ...], "bias": [...], "activation": "elu" },
//!         ...
//!     ]
//! }
//! ```
//!
//! where `weights` is row major with one row per output of the layer.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Internal
use crate::state::{RelativeState, REL_STATE_DIM};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the actor parameter file inside a policy directory.
pub const ACTOR_FILE_NAME: &str = "actor.json";

/// Name of the critic parameter file inside a policy directory.
pub const CRITIC_FILE_NAME: &str = "critic.json";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A dense feed forward network with a single output.
#[derive(Debug, Clone, PartialEq)]
pub struct Mlp {
    input_scale: DVector<f64>,
    layers: Vec<Layer>,
    output_gain: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Layer {
    weights: DMatrix<f64>,
    bias: DVector<f64>,
    activation: Activation,
}

/// The learned feedback policy.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedPolicy(Mlp);

/// The learned state value estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFunction(Mlp);

/// Policy and value function loaded from the same directory.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedController {
    pub policy: LearnedPolicy,
    pub value: ValueFunction,
}

/// On disk representation of an [`Mlp`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpFile {
    #[serde(default)]
    pub input_scale: Option<Vec<f64>>,

    #[serde(default = "default_output_gain")]
    pub output_gain: f64,

    pub layers: Vec<LayerFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerFile {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Elementwise activation applied after a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Identity,
    Relu,
    Elu,
    Tanh,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Cannot read network parameters from {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot parse network parameters: {0}")]
    DeserialiseError(serde_json::Error),

    #[error("Network has no layers")]
    NoLayers,

    #[error("Expected an input scale of length {expected}, found {found}")]
    InputScaleLength {
        expected: usize,
        found: usize
    },

    #[error(
        "Layer {layer} has shape {rows}x{cols}, bias of length {bias_len}, \
        but its input has dimension {input_dim}"
    )]
    LayerShape {
        layer: usize,
        rows: usize,
        cols: usize,
        bias_len: usize,
        input_dim: usize,
    },

    #[error("Row {row} of layer {layer} has {found} columns, expected {expected}")]
    RaggedWeights {
        layer: usize,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Network output has dimension {0}, expected 1")]
    OutputDim(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Activation {
    fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Identity => x,
            Activation::Relu => x.max(0.0),
            Activation::Elu => {
                if x > 0.0 {
                    x
                }
                else {
                    x.exp_m1()
                }
            },
            Activation::Tanh => x.tanh(),
        }
    }
}

impl Mlp {
    /// Build a network from its file representation, checking that every
    /// layer fits the one before it and that the network maps a relative
    /// state onto a scalar.
    pub fn from_file(file: MlpFile) -> Result<Self, LoadError> {
        if file.layers.is_empty() {
            return Err(LoadError::NoLayers);
        }

        let input_scale = match file.input_scale {
            Some(s) if s.len() != REL_STATE_DIM => {
                return Err(LoadError::InputScaleLength {
                    expected: REL_STATE_DIM,
                    found: s.len(),
                })
            },
            Some(s) => DVector::from_vec(s),
            None => DVector::from_element(REL_STATE_DIM, 1.0),
        };

        let mut layers = Vec::with_capacity(file.layers.len());
        let mut input_dim = REL_STATE_DIM;

        for (i, layer) in file.layers.into_iter().enumerate() {
            let rows = layer.weights.len();
            let cols = layer.weights.first().map(|r| r.len()).unwrap_or(0);

            if rows == 0 || cols != input_dim || layer.bias.len() != rows {
                return Err(LoadError::LayerShape {
                    layer: i,
                    rows,
                    cols,
                    bias_len: layer.bias.len(),
                    input_dim,
                });
            }

            if let Some((row, r)) = layer.weights
                .iter()
                .enumerate()
                .find(|(_, r)| r.len() != cols)
            {
                return Err(LoadError::RaggedWeights {
                    layer: i,
                    row,
                    expected: cols,
                    found: r.len(),
                });
            }

            let flat: Vec<f64> = layer.weights.into_iter().flatten().collect();

            layers.push(Layer {
                weights: DMatrix::from_row_slice(rows, cols, &flat),
                bias: DVector::from_vec(layer.bias),
                activation: layer.activation,
            });

            input_dim = rows;
        }

        if input_dim != 1 {
            return Err(LoadError::OutputDim(input_dim));
        }

        Ok(Self {
            input_scale,
            layers,
            output_gain: file.output_gain,
        })
    }

    /// Parse a network from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let file: MlpFile = serde_json::from_str(json)
            .map_err(LoadError::DeserialiseError)?;

        Self::from_file(file)
    }

    /// Load a network from a JSON parameter file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();

        let json = std::fs::read_to_string(path)
            .map_err(|e| LoadError::FileLoadError(path.to_path_buf(), e))?;

        let mlp = Self::from_json_str(&json)?;

        debug!(
            "Loaded network from {:?} with layer widths {:?}",
            path,
            mlp.layers.iter().map(|l| l.weights.nrows()).collect::<Vec<_>>()
        );

        Ok(mlp)
    }

    /// Evaluate the network on a relative state.
    pub fn forward(&self, state: &RelativeState) -> f64 {
        let mut x = DVector::from_vec(state.to_array().to_vec())
            .component_mul(&self.input_scale);

        for layer in &self.layers {
            x = &layer.weights * x + &layer.bias;
            let activation = layer.activation;
            x.apply(|v| activation.apply(v));
        }

        x[0] * self.output_gain
    }
}

impl LearnedPolicy {
    pub fn new(mlp: Mlp) -> Self {
        Self(mlp)
    }

    /// Steering demand for the given relative state.
    pub fn act(&self, state: &RelativeState) -> f64 {
        self.0.forward(state)
    }
}

impl ValueFunction {
    pub fn new(mlp: Mlp) -> Self {
        Self(mlp)
    }

    /// Estimated cost-to-go of the given relative state.
    pub fn value(&self, state: &RelativeState) -> f64 {
        self.0.forward(state)
    }
}

impl LearnedController {
    /// Load the actor and critic from a policy directory.
    pub fn load<P: AsRef<Path>>(policy_dir: P) -> Result<Self, LoadError> {
        let dir = policy_dir.as_ref();

        Ok(Self {
            policy: LearnedPolicy::new(Mlp::load(dir.join(ACTOR_FILE_NAME))?),
            value: ValueFunction::new(Mlp::load(dir.join(CRITIC_FILE_NAME))?),
        })
    }

    pub fn act(&self, state: &RelativeState) -> f64 {
        self.policy.act(state)
    }

    pub fn value(&self, state: &RelativeState) -> f64 {
        self.value.value(state)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_output_gain() -> f64 {
    1.0
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    const LINEAR: &str = r#"{
        "layers": [
            {
                "weights": [[-0.5, 0.0, -1.0, 0.0]],
                "bias": [0.0],
                "activation": "identity"
            }
        ]
    }"#;

    const HIDDEN: &str = r#"{
        "input_scale": [2.0, 1.0, 1.0, 1.0],
        "output_gain": 0.5,
        "layers": [
            {
                "weights": [[1.0, 0.0, 0.0, 0.0], [-1.0, 0.0, 0.0, 0.0]],
                "bias": [0.0, 0.0],
                "activation": "relu"
            },
            {
                "weights": [[1.0, 1.0]],
                "bias": [0.25],
                "activation": "tanh"
            }
        ]
    }"#;

    #[test]
    fn test_linear_network() {
        let mlp = Mlp::from_json_str(LINEAR).unwrap();
        let s = RelativeState::new(0.2, 5.0, 0.1, 5.0);

        assert_abs_diff_eq!(mlp.forward(&s), -0.5 * 0.2 - 0.1, epsilon = 1e-15);
    }

    #[test]
    fn test_hidden_layer() {
        let mlp = Mlp::from_json_str(HIDDEN).unwrap();

        // relu(|2y|) summed, plus bias, through tanh, times gain
        let s = RelativeState::new(-0.3, 0.0, 0.0, 0.0);
        assert_abs_diff_eq!(mlp.forward(&s), 0.5 * (0.6f64 + 0.25).tanh(), epsilon = 1e-15);
    }

    #[test]
    fn test_activations() {
        assert_eq!(Activation::Relu.apply(-1.0), 0.0);
        assert_eq!(Activation::Identity.apply(-1.0), -1.0);
        assert_abs_diff_eq!(Activation::Elu.apply(-1.0), (-1.0f64).exp() - 1.0, epsilon = 1e-15);
        assert_eq!(Activation::Elu.apply(2.0), 2.0);
    }

    #[test]
    fn test_deterministic() {
        let ctrl = LearnedController {
            policy: LearnedPolicy::new(Mlp::from_json_str(HIDDEN).unwrap()),
            value: ValueFunction::new(Mlp::from_json_str(LINEAR).unwrap()),
        };
        let s = RelativeState::new(0.7, -0.1, 0.05, 0.01);

        assert_eq!(ctrl.act(&s), ctrl.act(&s));
        assert_eq!(ctrl.value(&s), ctrl.value(&s));
    }

    #[test]
    fn test_shape_validation() {
        // Wrong input width
        let bad_input = r#"{ "layers": [
            { "weights": [[1.0, 1.0]], "bias": [0.0], "activation": "identity" }
        ] }"#;
        assert!(matches!(
            Mlp::from_json_str(bad_input),
            Err(LoadError::LayerShape { layer: 0, input_dim: 4, .. })
        ));

        // Two outputs
        let bad_output = r#"{ "layers": [
            {
                "weights": [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]],
                "bias": [0.0, 0.0],
                "activation": "identity"
            }
        ] }"#;
        assert!(matches!(Mlp::from_json_str(bad_output), Err(LoadError::OutputDim(2))));

        // Ragged rows
        let ragged = r#"{ "layers": [
            {
                "weights": [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0]],
                "bias": [0.0, 0.0],
                "activation": "identity"
            }
        ] }"#;
        assert!(matches!(
            Mlp::from_json_str(ragged),
            Err(LoadError::RaggedWeights { layer: 0, row: 1, .. })
        ));

        assert!(matches!(Mlp::from_json_str(r#"{ "layers": [] }"#), Err(LoadError::NoLayers)));
        assert!(matches!(Mlp::from_json_str("{"), Err(LoadError::DeserialiseError(_))));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = std::env::temp_dir().join(format!("lane_learned_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(ACTOR_FILE_NAME), LINEAR).unwrap();
        std::fs::write(dir.join(CRITIC_FILE_NAME), HIDDEN).unwrap();

        let ctrl = LearnedController::load(&dir).unwrap();
        let s = RelativeState::new(0.1, 0.0, 0.0, 0.0);
        assert_abs_diff_eq!(ctrl.act(&s), -0.05, epsilon = 1e-15);

        assert!(matches!(
            LearnedController::load(dir.join("missing")),
            Err(LoadError::FileLoadError(..))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
