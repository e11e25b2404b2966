#![allow(clippy::module_name_repetitions)]
//! Canonical file paths under the data directory.
//!
//! ```text
//! <data_dir>/raw/        monthly exports and geofence tables
//! <data_dir>/land/       land-mass geometry
//! <data_dir>/processed/  index snapshots and batch artifacts
//! ```

use std::path::{Path, PathBuf};

use latency_map_models::YearMonth;

/// Overrides [`default_data_dir`] when set.
pub const DATA_DIR_ENV: &str = "LATENCY_MAP_DATA_DIR";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`, falling back to the
/// current directory if the manifest is not nested as expected.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns `$LATENCY_MAP_DATA_DIR`, or the project's `data/` directory.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| project_root().join("data"), PathBuf::from)
}

#[must_use]
pub fn raw_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("raw")
}

#[must_use]
pub fn processed_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("processed")
}

/// Default location of the land-mass `GeoJSON`.
#[must_use]
pub fn default_land_geometry_path(data_dir: &Path) -> PathBuf {
    data_dir.join("land").join("land.geojson")
}

/// Geofence index snapshot for a customer.
#[must_use]
pub fn index_snapshot_path(data_dir: &Path, customer: &str) -> PathBuf {
    processed_dir(data_dir).join(format!("polygon_index_{customer}.msgpack"))
}

/// Classified report table for a customer and month.
#[must_use]
pub fn classified_reports_path(data_dir: &Path, customer: &str, month: YearMonth) -> PathBuf {
    let (year, month) = month.file_parts();
    processed_dir(data_dir).join(format!("processed_gps_data_{customer}_{year}_{month}.csv"))
}

/// Per-geofence statistics table for a customer and month.
#[must_use]
pub fn geofence_stats_path(data_dir: &Path, customer: &str, month: YearMonth) -> PathBuf {
    let (year, month) = month.file_parts();
    processed_dir(data_dir).join(format!(
        "processed_geofence_stats_{customer}_{year}_{month}.csv"
    ))
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
