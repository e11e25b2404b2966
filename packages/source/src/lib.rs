#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Input sources and report normalization.
//!
//! Each input the pipeline consumes sits behind a trait so the batch logic
//! never depends on where data comes from: [`ReportSource`] yields a month
//! of GPS burst reports, [`GeofenceSource`] a customer's geofence
//! definitions, and [`LandSource`] the land-mass geometry. File-backed
//! implementations live in [`files`]; [`retry`] wraps any source call with
//! exponential backoff for transient failures.

pub mod files;
pub mod parsing;
pub mod progress;
pub mod retry;
pub mod timestamps;

use std::path::PathBuf;

use async_trait::async_trait;
use geo::MultiPolygon;
use latency_map_models::{GeofenceRow, RawReport, YearMonth};

/// Errors that can occur while reading or normalizing inputs.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested input does not exist yet.
    #[error("Input not found: {} ({hint})", .path.display())]
    InputNotFound {
        /// Where the input was expected.
        path: PathBuf,
        /// What to run to produce it.
        hint: String,
    },

    /// A payload does not embed a `GPS Data: <lat>,<lon>` fix.
    #[error("No GPS coordinates in payload of report {row}: {payload:?}")]
    CoordinateExtraction {
        /// Position of the report in the batch.
        row: usize,
        /// The payload that failed to match.
        payload: String,
    },

    /// No accepted timestamp format parses the whole column.
    #[error("Unrecognized timestamp format in column {column} (first value: {sample:?})")]
    UnrecognizedTimestampFormat {
        /// Column name.
        column: String,
        /// First value of the column, for diagnostics.
        sample: Option<String>,
    },

    /// A retryable failure reported by the upstream source.
    #[error("Transient source error: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// CSV reading failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Geometry input could not be parsed.
    #[error("Geometry error: {0}")]
    Geometry(#[from] latency_map_spatial::SpatialError),
}

impl SourceError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// Provider of GPS burst reports for one customer and month.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Short identifier used in log messages.
    fn name(&self) -> &str;

    /// Fetches every report whose event time falls within `month`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InputNotFound`] if the month has not been
    /// exported, or [`SourceError::Transient`] for retryable failures.
    async fn fetch_reports(
        &self,
        customer: &str,
        month: YearMonth,
    ) -> Result<Vec<RawReport>, SourceError>;
}

/// Provider of a customer's geofence definition table.
#[async_trait]
pub trait GeofenceSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetches the definition rows in their stable table order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the table is missing or unreadable.
    async fn fetch_geofences(&self, customer: &str) -> Result<Vec<GeofenceRow>, SourceError>;
}

/// Provider of the static land-mass geometry (`x = lon`, `y = lat`).
#[async_trait]
pub trait LandSource: Send + Sync {
    fn name(&self) -> &str;

    /// Loads the land geometry.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the geometry is missing or invalid.
    async fn fetch_land(&self) -> Result<MultiPolygon<f64>, SourceError>;
}
