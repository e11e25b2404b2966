#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persistence of batch artifacts.
//!
//! A processed `(customer, month)` batch consists of the geofence index
//! snapshot, the classified report table, and the per-geofence statistics
//! table. [`artifacts`] writes them all-or-nothing and loads them back;
//! [`tables`] holds the CSV encodings and [`paths`] the directory layout.

pub mod artifacts;
pub mod paths;
pub mod tables;

use std::path::PathBuf;

pub use artifacts::{MonthArtifacts, StagedWrite, load_index, load_month, save_batch, save_index};

/// Errors that can occur while saving or loading artifacts.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// One or more required artifacts do not exist.
    #[error(
        "Missing artifacts: {}; run `latency_map process` for this month first",
        display_paths(.missing)
    )]
    InputNotFound {
        /// Every missing file, not just the first.
        missing: Vec<PathBuf>,
    },

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file write, rename, or read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The index snapshot could not be encoded or decoded.
    #[error("Index snapshot error: {0}")]
    Snapshot(#[from] latency_map_spatial::SpatialError),

    /// A table row has a missing or invalid field.
    #[error("Malformed row {row} in {}: {message}", .path.display())]
    MalformedRow {
        /// Table the row came from.
        path: PathBuf,
        /// 1-based data row number.
        row: usize,
        /// What was wrong with it.
        message: String,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
