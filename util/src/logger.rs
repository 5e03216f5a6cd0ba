//! Logging setup
//!
//! Records are written both to stdout, with coloured level tags, and to the
//! session's log file without colour codes. Each record is stamped with the
//! seconds elapsed since the session epoch.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{self, info, Level, Record};
use std::fmt::Arguments;
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a minimum log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// `caps` limits the level of individual targets (module paths), so noisy
/// modules can be kept quieter than `min_level`. A cap never raises a target
/// above `min_level`.
///
/// # Notes
///
/// - `min_level` must be at least as detailed as `log::Level::Info`.
/// - Only one logger may be initialised per process, further calls fail with
///   `FernInitError`.
pub fn logger_init(
    min_level: LevelFilter,
    caps: &[(&'static str, LevelFilter)],
    session: &Session
) -> Result<(), LoggerInitError> {

    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new().level(min_level);
    for (target, cap) in caps {
        dispatch = dispatch.level_for(*target, min_level.min(*cap));
    }

    let console = fern::Dispatch::new()
        .format(|out, message, record| format_record(out, message, record, true))
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| format_record(out, message, record, false))
        .chain(log_file);

    dispatch
        .chain(console)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    for (target, cap) in caps {
        info!("    {} capped at {:?}", target, min_level.min(*cap));
    }
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Debug and trace records also name their target.
fn format_record(out: fern::FormatCallback, message: &Arguments, record: &Record, colour: bool) {
    let tag = level_tag(record.level(), colour);
    let elapsed = session::get_elapsed_seconds();

    if record.level() > Level::Info {
        out.finish(format_args!(
            "[{:10.6} {}] {}: {}",
            elapsed, tag, record.target(), message
        ))
    }
    else {
        out.finish(format_args!("[{:10.6} {}] {}", elapsed, tag, message))
    }
}

fn level_tag(level: Level, colour: bool) -> ColoredString {
    let tag = match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info  => "INF",
        Level::Warn  => "WRN",
        Level::Error => "ERR",
    };

    if !colour {
        return tag.normal();
    }

    match level {
        Level::Trace => tag.dimmed().italic(),
        Level::Debug => tag.dimmed(),
        Level::Info  => tag.normal(),
        Level::Warn  => tag.yellow(),
        Level::Error => tag.red().bold(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_min_level_checked_before_caps() {
        let dir = std::env::temp_dir().join(format!("util_logger_{}", std::process::id()));
        let session = Session::new("logger_test", &dir).unwrap();

        let result = logger_init(
            LevelFilter::Warn,
            &[("lane_lib::ctrl::mpc", LevelFilter::Debug)],
            &session
        );

        assert!(matches!(
            result,
            Err(LoggerInitError::InvalidMinLogLevel(LevelFilter::Warn))
        ));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_plain_level_tags() {
        assert_eq!(&*level_tag(Level::Warn, false), "WRN");
        assert_eq!(&*level_tag(Level::Trace, false), "TRC");
    }
}
