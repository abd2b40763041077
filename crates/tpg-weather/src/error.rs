//! Error types for the `tpg-weather` crate.
//!
//! Every variant describes malformed track input. Malformed input makes the
//! dataset unusable, so these errors abort the run; forecasting itself never
//! fails.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use tpg_types::TyphoonId;

/// Errors raised while ingesting a typhoon track dataset.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// The track file could not be read.
    #[error("failed to read track file {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The dataset has no header line.
    #[error("track data is empty")]
    Empty,

    /// A required column is missing from the header.
    #[error("track data is missing required column `{column}`")]
    MissingColumn {
        /// The missing column name.
        column: &'static str,
    },

    /// A field could not be parsed.
    #[error("line {line}: cannot parse `{value}` as {column}")]
    Parse {
        /// One-based line number in the input.
        line: usize,
        /// The column being parsed.
        column: &'static str,
        /// The offending text.
        value: String,
    },

    /// A row has fewer fields than the header.
    #[error("line {line}: expected {expected} fields, found {found}")]
    ShortRow {
        /// One-based line number in the input.
        line: usize,
        /// Number of header columns.
        expected: usize,
        /// Number of fields on the row.
        found: usize,
    },

    /// A coordinate is outside the valid latitude or longitude range.
    #[error("line {line}: coordinate out of range (lat {lat}, lon {lon})")]
    InvalidCoordinate {
        /// One-based line number in the input.
        line: usize,
        /// The rejected latitude.
        lat: f64,
        /// The rejected longitude.
        lon: f64,
    },

    /// Observations of one typhoon are not strictly increasing in time.
    #[error("typhoon {typhoon_id}: timestamp {found} does not follow {previous}")]
    NonMonotonicTimestamp {
        /// The typhoon with the bad ordering.
        typhoon_id: TyphoonId,
        /// The preceding observation time.
        previous: DateTime<Utc>,
        /// The out-of-order observation time.
        found: DateTime<Utc>,
    },
}
