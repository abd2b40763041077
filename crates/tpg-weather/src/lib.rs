//! Typhoon tracks and forecasts for the fleet simulation.
//!
//! # Modules
//!
//! - [`track`] -- [`TyphoonTrackStore`]: validated, immutable observed tracks
//!   with CSV ingestion and time/position queries.
//! - [`forecast`] -- [`Forecaster`]: per-tick predicted trajectories with a
//!   linear error model and optional reproducible position scatter.
//! - [`error`] -- [`TrackError`] for malformed track input.

pub mod error;
pub mod forecast;
pub mod track;

// Re-export primary types at crate root.
pub use error::TrackError;
pub use forecast::Forecaster;
pub use track::{TyphoonTrackStore, hours};
