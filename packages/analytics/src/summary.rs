//! Batch-wide dashboard figures.

use std::collections::BTreeSet;

use chrono::TimeDelta;
use latency_map_models::{BatchSummary, ClassifiedReport};

use crate::percentage;

/// Summarizes a classified batch.
///
/// The land share is over all reports; the late share is over land reports
/// only.
#[must_use]
pub fn summarize(
    reports: &[ClassifiedReport],
    total_geofences: usize,
    threshold: TimeDelta,
) -> BatchSummary {
    let unique_devices: BTreeSet<&str> = reports
        .iter()
        .map(|r| r.report.device_id.as_str())
        .collect();

    let land: Vec<&ClassifiedReport> = reports.iter().filter(|r| !r.is_at_sea).collect();
    let land_reports = land.len() as u64;
    let land_latency_reports = land.iter().filter(|r| r.is_late(threshold)).count() as u64;
    let conflicts = reports
        .iter()
        .filter(|r| r.is_geofence_sea_conflict())
        .count() as u64;
    let total_reports = reports.len() as u64;

    BatchSummary {
        total_reports,
        unique_devices: unique_devices.len() as u64,
        total_geofences: total_geofences as u64,
        land_reports,
        land_pct: percentage(land_reports, total_reports),
        land_latency_reports,
        land_latency_pct: percentage(land_latency_reports, land_reports),
        geofence_at_sea_conflicts: conflicts,
    }
}
