//! Utility library for the lane keeping simulation software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod archive;
pub mod logger;
pub mod maths;
pub mod params;
pub mod session;
pub mod time;
