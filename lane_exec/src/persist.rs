//! # Rollout persistence
//!
//! Rollouts are saved as space delimited numeric tables, one row per step:
//!
//! | Controller | States                     | Controls                     | Values          |
//! |------------|----------------------------|------------------------------|-----------------|
//! | `ADP`      | `ADP_state.txt`            | `ADP_control.txt`            | `ADP_value.txt` |
//! | `MPC`      | `structured_MPC_state.txt` | `structured_MPC_control.txt` |                 |
//! | `OP`       | `Open_loop_state.txt`      | `Open_loop_control.txt`      |                 |
//!
//! State rows are in [`AbsoluteState::to_row`] order. Decision times are not
//! persisted.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;
use util::archive::{self, ArchiveError};

// Internal
use crate::{
    ctrl::ControllerKind,
    rollout::{Rollout, RolloutError},
    state::{AbsoluteState, ABS_STATE_DIM},
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Row {row} of {path:?} has {found} columns, expected {expected}")]
    BadRow {
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Persisted tables do not form a rollout: {0}")]
    Rollout(#[from] RolloutError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// File name prefix of a controller's tables.
pub fn table_stem(kind: ControllerKind) -> &'static str {
    match kind {
        ControllerKind::Learned => "ADP",
        ControllerKind::Optimizing => "structured_MPC",
        ControllerKind::Precomputed => "Open_loop",
    }
}

pub fn state_file_name(kind: ControllerKind) -> String {
    format!("{}_state.txt", table_stem(kind))
}

pub fn control_file_name(kind: ControllerKind) -> String {
    format!("{}_control.txt", table_stem(kind))
}

pub fn value_file_name(kind: ControllerKind) -> String {
    format!("{}_value.txt", table_stem(kind))
}

/// Save a control sequence as a single column table.
pub fn save_controls<R: AsRef<Path>, P: AsRef<Path>>(
    dir: R,
    file_name: P,
    controls: &[f64]
) -> Result<PathBuf, PersistError> {
    Ok(archive::write_table(dir, file_name, controls.iter().map(|u| [*u]))?)
}

/// Save all histories of a rollout into `dir`, returning the paths written.
pub fn save_rollout<P: AsRef<Path>>(dir: P, rollout: &Rollout) -> Result<Vec<PathBuf>, PersistError> {
    let dir = dir.as_ref();
    let kind = rollout.kind();
    let mut paths = Vec::with_capacity(3);

    paths.push(archive::write_table(
        dir,
        state_file_name(kind),
        rollout.states().iter().map(|s| s.to_row())
    )?);
    paths.push(save_controls(dir, control_file_name(kind), rollout.controls())?);

    if let Some(values) = rollout.values() {
        paths.push(save_controls(dir, value_file_name(kind), values)?);
    }

    debug!("Saved {} rollout to {:?}", kind, paths);

    Ok(paths)
}

/// Load a rollout of the given kind previously saved into `dir`.
///
/// The value table is read if it exists.
pub fn load_rollout<P: AsRef<Path>>(dir: P, kind: ControllerKind) -> Result<Rollout, PersistError> {
    let dir = dir.as_ref();

    let state_path = dir.join(state_file_name(kind));
    let states = archive::read_table(&state_path)?
        .iter()
        .enumerate()
        .map(|(row, r)| AbsoluteState::from_row(r).ok_or_else(|| PersistError::BadRow {
            path: state_path.clone(),
            row,
            expected: ABS_STATE_DIM,
            found: r.len(),
        }))
        .collect::<Result<Vec<_>, _>>()?;

    let controls = load_column(dir.join(control_file_name(kind)))?;

    let value_path = dir.join(value_file_name(kind));
    let values = if value_path.exists() {
        Some(load_column(value_path)?)
    }
    else {
        None
    };

    Ok(Rollout::new(kind, states, controls, values, Duration::default())?)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn load_column(path: PathBuf) -> Result<Vec<f64>, PersistError> {
    archive::read_table(&path)?
        .iter()
        .enumerate()
        .map(|(row, r)| match r.as_slice() {
            [v] => Ok(*v),
            _ => Err(PersistError::BadRow {
                path: path.clone(),
                row,
                expected: 1,
                found: r.len(),
            }),
        })
        .collect()
}
