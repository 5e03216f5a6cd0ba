//! # Comparative analysis
//!
//! Reduces a set of rollouts, one per controller, to tracking error series
//! and summary statistics. Errors are measured against the reference
//! evaluated at each rollout's own longitudinal positions, so rollouts that
//! progress differently along the lane are still compared fairly.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;
use serde::Serialize;
use util::maths;

// Internal
use crate::{
    ctrl::ControllerKind,
    reference::Reference,
    rollout::Rollout,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct ComparativeAnalyzer<'a> {
    reference: &'a dyn Reference,
}

/// Per-step errors of one rollout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSeries {
    pub controller: ControllerKind,

    /// Longitudinal position of each state, for plotting against
    pub long_pos_m: Vec<f64>,

    pub lat_error_m: Vec<f64>,

    pub head_error_deg: Vec<f64>,

    /// Control minus the baseline's control at the same step, only present
    /// when a baseline was given
    pub control_deviation_rad: Option<Vec<f64>>,
}

/// Scalar summary of one rollout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSummary {
    pub controller: ControllerKind,
    pub mean_abs_lat_error_m: f64,
    pub max_abs_lat_error_m: f64,
    pub mean_abs_head_error_deg: f64,
    pub max_abs_head_error_deg: f64,
    pub mean_abs_control_deviation_rad: Option<f64>,
    pub decision_time_s: f64,
}

/// The result of comparing a set of rollouts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub baseline: Option<ControllerKind>,
    pub summaries: Vec<ControllerSummary>,

    #[serde(skip)]
    pub series: Vec<ErrorSeries>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error(
        "{label} rollout has {len} controls but the baseline has {baseline_len}, \
        cannot compare them step by step"
    )]
    LengthMismatch {
        label: ControllerKind,
        len: usize,
        baseline_len: usize,
    },

    #[error("Baseline {0} is not one of the rollouts being compared")]
    UnknownBaseline(ControllerKind),

    #[error("{0} rollout contains no steps")]
    EmptyRollout(ControllerKind),

    #[error("More than one {0} rollout given")]
    DuplicateController(ControllerKind),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> ComparativeAnalyzer<'a> {
    pub fn new(reference: &'a dyn Reference) -> Self {
        Self { reference }
    }

    /// Compute the error series and summaries of each rollout.
    ///
    /// If `baseline` is given every rollout must have the same number of
    /// controls as the baseline's.
    pub fn analyse(
        &self,
        rollouts: &[Rollout],
        baseline: Option<ControllerKind>
    ) -> Result<ComparisonReport, AnalysisError> {
        for (i, r) in rollouts.iter().enumerate() {
            if r.horizon() == 0 {
                return Err(AnalysisError::EmptyRollout(r.kind()));
            }
            if rollouts[..i].iter().any(|other| other.kind() == r.kind()) {
                return Err(AnalysisError::DuplicateController(r.kind()));
            }
        }

        let baseline_controls = match baseline {
            Some(kind) => Some(
                rollouts
                    .iter()
                    .find(|r| r.kind() == kind)
                    .ok_or(AnalysisError::UnknownBaseline(kind))?
                    .controls()
            ),
            None => None,
        };

        let mut summaries = Vec::with_capacity(rollouts.len());
        let mut series = Vec::with_capacity(rollouts.len());

        for rollout in rollouts {
            let s = self.error_series(rollout, baseline_controls)?;
            let summary = summarise(&s, rollout);

            info!(
                "{}: lateral error mean {:.3e} m max {:.3e} m, heading error mean {:.3e} deg \
                max {:.3e} deg",
                summary.controller,
                summary.mean_abs_lat_error_m,
                summary.max_abs_lat_error_m,
                summary.mean_abs_head_error_deg,
                summary.max_abs_head_error_deg
            );

            summaries.push(summary);
            series.push(s);
        }

        Ok(ComparisonReport {
            baseline,
            summaries,
            series,
        })
    }

    /// Errors of a single rollout against the reference.
    pub fn error_series(
        &self,
        rollout: &Rollout,
        baseline_controls: Option<&[f64]>
    ) -> Result<ErrorSeries, AnalysisError> {
        let states = rollout.states();

        let mut long_pos_m = Vec::with_capacity(states.len());
        let mut lat_error_m = Vec::with_capacity(states.len());
        let mut head_error_deg = Vec::with_capacity(states.len());

        for s in states {
            let r = self.reference.at(s.long_pos_m);
            long_pos_m.push(s.long_pos_m);
            lat_error_m.push(s.lat_pos_m - r.lat_pos_m);
            head_error_deg.push(maths::rad_to_deg(s.head_rad - r.head_rad));
        }

        let control_deviation_rad = match baseline_controls {
            Some(b) => Some(
                maths::diff(rollout.controls(), b).ok_or(AnalysisError::LengthMismatch {
                    label: rollout.kind(),
                    len: rollout.horizon(),
                    baseline_len: b.len(),
                })?
            ),
            None => None,
        };

        Ok(ErrorSeries {
            controller: rollout.kind(),
            long_pos_m,
            lat_error_m,
            head_error_deg,
            control_deviation_rad,
        })
    }
}

impl ComparisonReport {
    pub fn summary(&self, controller: ControllerKind) -> Option<&ControllerSummary> {
        self.summaries.iter().find(|s| s.controller == controller)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn summarise(series: &ErrorSeries, rollout: &Rollout) -> ControllerSummary {
    // Series are never empty here, a rollout always holds its initial state
    let mean = |v: &[f64]| maths::mean_abs(v).unwrap_or(std::f64::NAN);
    let max = |v: &[f64]| maths::max_abs(v).unwrap_or(std::f64::NAN);

    ControllerSummary {
        controller: series.controller,
        mean_abs_lat_error_m: mean(&series.lat_error_m),
        max_abs_lat_error_m: max(&series.lat_error_m),
        mean_abs_head_error_deg: mean(&series.head_error_deg),
        max_abs_head_error_deg: max(&series.head_error_deg),
        mean_abs_control_deviation_rad: series.control_deviation_rad
            .as_deref()
            .map(mean),
        decision_time_s: rollout.decision_time().as_secs_f64(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        reference::{FlatLane, SineLane},
        state::AbsoluteState,
    };
    use approx::assert_abs_diff_eq;
    use std::time::Duration;

    fn rollout(kind: ControllerKind, lat: &[f64], controls: &[f64]) -> Rollout {
        let states = lat
            .iter()
            .enumerate()
            .map(|(i, y)| AbsoluteState::new(*y, 0.0, 0.0, 0.0, i as f64))
            .collect();

        Rollout::new(kind, states, controls.to_vec(), None, Duration::from_millis(5)).unwrap()
    }

    #[test]
    fn test_errors_on_flat_lane() {
        let analyzer = ComparativeAnalyzer::new(&FlatLane);
        let a = rollout(ControllerKind::Learned, &[0.0, 0.5, -1.0], &[0.1, 0.2]);
        let b = rollout(ControllerKind::Precomputed, &[0.0, 0.0, 0.0], &[0.0, 0.1]);

        let report = analyzer.analyse(&[a, b], Some(ControllerKind::Precomputed)).unwrap();

        let s = report.summary(ControllerKind::Learned).unwrap();
        assert_abs_diff_eq!(s.mean_abs_lat_error_m, 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(s.max_abs_lat_error_m, 1.0);
        assert_abs_diff_eq!(s.mean_abs_control_deviation_rad.unwrap(), 0.1, epsilon = 1e-15);
        assert_abs_diff_eq!(s.decision_time_s, 0.005, epsilon = 1e-12);

        let baseline = report.summary(ControllerKind::Precomputed).unwrap();
        assert_eq!(baseline.mean_abs_control_deviation_rad, Some(0.0));
        assert_eq!(baseline.mean_abs_lat_error_m, 0.0);
    }

    #[test]
    fn test_heading_in_degrees() {
        let lane = SineLane::default();
        let analyzer = ComparativeAnalyzer::new(&lane);

        let r = lane.at(3.0);
        let states = vec![
            AbsoluteState::new(r.lat_pos_m, 0.0, r.head_rad + 0.01, 0.0, 3.0),
            AbsoluteState::new(r.lat_pos_m, 0.0, r.head_rad + 0.01, 0.0, 3.0),
        ];
        let rollout = Rollout::new(
            ControllerKind::Optimizing,
            states,
            vec![0.0],
            None,
            Duration::default()
        ).unwrap();

        let series = analyzer.error_series(&rollout, None).unwrap();
        assert_abs_diff_eq!(series.lat_error_m[0], 0.0);
        assert_abs_diff_eq!(series.head_error_deg[0], 0.01 * 180.0 / std::f64::consts::PI, epsilon = 1e-12);
        assert_eq!(series.control_deviation_rad, None);
    }

    #[test]
    fn test_length_mismatch() {
        let analyzer = ComparativeAnalyzer::new(&FlatLane);
        let a = rollout(ControllerKind::Learned, &[0.0, 0.1, 0.2], &[0.0, 0.0]);
        let b = rollout(ControllerKind::Precomputed, &[0.0, 0.1], &[0.0]);

        assert_eq!(
            analyzer.analyse(&[a.clone(), b.clone()], Some(ControllerKind::Precomputed)),
            Err(AnalysisError::LengthMismatch {
                label: ControllerKind::Learned,
                len: 2,
                baseline_len: 1
            })
        );

        // Without a baseline there is nothing to align
        assert!(analyzer.analyse(&[a, b], None).is_ok());
    }

    #[test]
    fn test_bad_inputs() {
        let analyzer = ComparativeAnalyzer::new(&FlatLane);
        let a = rollout(ControllerKind::Learned, &[0.0, 0.1], &[0.0]);

        assert_eq!(
            analyzer.analyse(&[a.clone()], Some(ControllerKind::Precomputed)),
            Err(AnalysisError::UnknownBaseline(ControllerKind::Precomputed))
        );
        assert_eq!(
            analyzer.analyse(&[a.clone(), a], None),
            Err(AnalysisError::DuplicateController(ControllerKind::Learned))
        );

        let empty = rollout(ControllerKind::Optimizing, &[0.0], &[]);
        assert_eq!(
            analyzer.analyse(&[empty], None),
            Err(AnalysisError::EmptyRollout(ControllerKind::Optimizing))
        );
    }

    #[test]
    fn test_order_independent() {
        let lane = SineLane::default();
        let analyzer = ComparativeAnalyzer::new(&lane);
        let a = rollout(ControllerKind::Learned, &[0.0, 0.3, 0.1], &[0.1, -0.1]);
        let b = rollout(ControllerKind::Optimizing, &[0.0, -0.2, 0.4], &[0.05, 0.0]);
        let c = rollout(ControllerKind::Precomputed, &[0.0, 0.1, 0.1], &[0.0, 0.0]);

        let forward = analyzer
            .analyse(&[a.clone(), b.clone(), c.clone()], Some(ControllerKind::Precomputed))
            .unwrap();
        let backward = analyzer
            .analyse(&[c, b, a], Some(ControllerKind::Precomputed))
            .unwrap();

        for kind in ControllerKind::ALL.iter() {
            assert_eq!(forward.summary(*kind), backward.summary(*kind));
        }
    }
}
