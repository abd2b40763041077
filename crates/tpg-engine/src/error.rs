//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps every failure
//! mode during startup and the simulation run.

use std::path::PathBuf;

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tpg_core::config::ConfigError,
    },

    /// The typhoon track dataset could not be loaded.
    #[error("track error: {source}")]
    Track {
        /// The underlying track error.
        #[from]
        source: tpg_weather::TrackError,
    },

    /// The simulation state could not be assembled.
    #[error("setup error: {source}")]
    Setup {
        /// The underlying tick error.
        #[from]
        source: tpg_core::tick::TickError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: tpg_core::runner::RunnerError,
    },

    /// The tick log could not be written.
    #[error("tick log {path}: {source}")]
    TickLog {
        /// The tick log file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
