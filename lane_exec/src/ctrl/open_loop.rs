//! Precomputed open-loop controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::CtrlError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Replays a fixed control sequence, ignoring the state entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenLoopController {
    controls: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl OpenLoopController {
    pub fn new(controls: Vec<f64>) -> Self {
        Self { controls }
    }

    /// Fails if the sequence is shorter than `horizon`.
    pub fn validate(&self, horizon: usize) -> Result<(), CtrlError> {
        if horizon > self.controls.len() {
            Err(CtrlError::LookupOutOfRange {
                horizon,
                len: self.controls.len(),
            })
        }
        else {
            Ok(())
        }
    }

    /// Control for the given step index.
    pub fn act(&self, step: usize) -> Result<f64, CtrlError> {
        self.controls
            .get(step)
            .copied()
            .ok_or(CtrlError::LookupOutOfRange {
                horizon: step + 1,
                len: self.controls.len(),
            })
    }
}
