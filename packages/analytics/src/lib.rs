#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Latency statistics over a classified batch.
//!
//! [`stats::aggregate_stats`] produces one [`GeofenceStat`] per geofence;
//! [`summary::summarize`] produces the batch-wide dashboard figures. Both
//! are pure functions of the classified reports and never fail: empty
//! partitions and zero denominators yield zeros.
//!
//! [`GeofenceStat`]: latency_map_models::GeofenceStat

pub mod stats;
pub mod summary;

pub use stats::{DEFAULT_LATENCY_THRESHOLD_HOURS, aggregate_stats, latency_threshold, severity};
pub use summary::summarize;

/// `part / total` as a percentage rounded to one decimal, or 0 when
/// `total` is 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(part as f64 / total as f64 * 100.0)
}

/// Rounds to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
