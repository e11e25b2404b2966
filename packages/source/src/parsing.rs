//! Coordinate extraction from GPS burst payloads.
//!
//! Trackers embed their fix in free-form payload text as
//! `GPS Data: <lat>,<lon>`.

use std::sync::LazyLock;

use latency_map_models::{LatLon, RawReport};
use regex::Regex;

use crate::SourceError;

/// Matches the first `GPS Data: <lat>,<lon>` fix in a payload.
static GPS_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"GPS Data:[ \t]*(-?[0-9]+(?:\.[0-9]+)?)[ \t]*,[ \t]*(-?[0-9]+(?:\.[0-9]+)?)")
        .expect("valid regex")
});

/// Extracts the `(lat, lon)` fix from a payload, if present.
#[must_use]
pub fn extract_gps(payload: &str) -> Option<LatLon> {
    let caps = GPS_DATA_RE.captures(payload)?;
    let lat = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let lon = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some(LatLon::new(lat, lon))
}

/// Extracts the fix of every report, in order.
///
/// # Errors
///
/// Returns [`SourceError::CoordinateExtraction`] for the first report
/// whose payload carries no fix; the batch is not partially processed.
pub fn extract_positions(reports: &[RawReport]) -> Result<Vec<LatLon>, SourceError> {
    reports
        .iter()
        .enumerate()
        .map(|(row, report)| {
            extract_gps(&report.payload).ok_or_else(|| SourceError::CoordinateExtraction {
                row,
                payload: report.payload.clone(),
            })
        })
        .collect()
}
