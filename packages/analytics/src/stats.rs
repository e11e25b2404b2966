//! Per-geofence latency statistics and severity.

use std::collections::{BTreeSet, HashMap};

use chrono::TimeDelta;
use latency_map_models::{ClassifiedReport, GeofenceStat};

use crate::{percentage, round1};

/// Reports received this long after the event count as late.
pub const DEFAULT_LATENCY_THRESHOLD_HOURS: u32 = 24;

/// Converts a threshold in hours to a duration.
#[must_use]
pub fn latency_threshold(hours: u32) -> TimeDelta {
    TimeDelta::hours(i64::from(hours))
}

#[derive(Default)]
struct Partition<'a> {
    messages: u64,
    late_messages: u64,
    devices: BTreeSet<&'a str>,
    late_devices: BTreeSet<&'a str>,
}

/// Blends the two latency ratios with a logarithmic traffic factor.
///
/// `volume` is `messages * devices` for the geofence and `max_volume` is
/// `max messages * max devices` over the batch. Returns 0 when the
/// geofence has no traffic or the batch maximum is at most 1, where the
/// normalizing logarithm is zero or undefined.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn severity(message_ratio: f64, device_ratio: f64, volume: u64, max_volume: u64) -> f64 {
    if volume == 0 || max_volume <= 1 {
        return 0.0;
    }
    let volume_factor = (volume as f64 + 0.1).log10() / (max_volume as f64).log10();
    round1(f64::midpoint(message_ratio, device_ratio) * volume_factor)
}

/// Computes one [`GeofenceStat`] per geofence name, in the given order.
///
/// Reports are matched to geofences by exact name. Reports naming an
/// unknown geofence are ignored, and geofences without reports get all
/// counts, ratios, and severity at 0.
#[must_use]
pub fn aggregate_stats<'a, I>(
    geofence_names: I,
    reports: &[ClassifiedReport],
    threshold: TimeDelta,
) -> Vec<GeofenceStat>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut partitions: HashMap<&str, Partition<'_>> = HashMap::new();
    for report in reports {
        let Some(name) = report.containing_geofence.as_deref() else {
            continue;
        };
        let partition = partitions.entry(name).or_default();
        let device = report.report.device_id.as_str();
        partition.messages += 1;
        partition.devices.insert(device);
        if report.is_late(threshold) {
            partition.late_messages += 1;
            partition.late_devices.insert(device);
        }
    }

    let empty = Partition::default();
    let mut stats: Vec<GeofenceStat> = geofence_names
        .into_iter()
        .map(|name| {
            let partition = partitions.get(name).unwrap_or(&empty);
            let total_devices = partition.devices.len() as u64;
            let latency_devices = partition.late_devices.len() as u64;
            GeofenceStat {
                name: name.to_string(),
                total_messages: partition.messages,
                total_devices,
                latency_messages: partition.late_messages,
                latency_devices,
                latency_message_ratio: percentage(partition.late_messages, partition.messages),
                latency_device_ratio: percentage(latency_devices, total_devices),
                device_ids: partition.devices.iter().map(ToString::to_string).collect(),
                latency_device_ids: partition
                    .late_devices
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                severity: 0.0,
            }
        })
        .collect();

    let max_messages = stats.iter().map(|s| s.total_messages).max().unwrap_or(0);
    let max_devices = stats.iter().map(|s| s.total_devices).max().unwrap_or(0);
    let max_volume = max_messages.saturating_mul(max_devices);

    for stat in &mut stats {
        stat.severity = severity(
            stat.latency_message_ratio,
            stat.latency_device_ratio,
            stat.total_messages.saturating_mul(stat.total_devices),
            max_volume,
        );
    }

    log::debug!(
        "Aggregated {} geofences (max {max_messages} messages, {max_devices} devices)",
        stats.len()
    );

    stats
}

#[cfg(test)]
mod tests {
    use latency_map_models::{LatLon, RawReport};

    use super::*;

    fn classified(device: &str, geofence: Option<&str>, latency_hours: i64) -> ClassifiedReport {
        ClassifiedReport {
            report: RawReport {
                device_id: device.to_string(),
                receive_time: String::new(),
                event_time: String::new(),
                f_port: None,
                payload: String::new(),
            },
            position: LatLon::new(0.0, 0.0),
            latency: TimeDelta::hours(latency_hours),
            containing_geofence: geofence.map(ToString::to_string),
            is_at_sea: false,
        }
    }

    fn threshold() -> TimeDelta {
        latency_threshold(DEFAULT_LATENCY_THRESHOLD_HOURS)
    }

    #[test]
    fn geofence_without_reports_is_all_zero() {
        let reports = vec![classified("A", Some("Busy"), 30)];
        let stats = aggregate_stats(["Busy", "Quiet"], &reports, threshold());

        let quiet = &stats[1];
        assert_eq!(quiet.name, "Quiet");
        assert_eq!(quiet.total_messages, 0);
        assert_eq!(quiet.total_devices, 0);
        assert!(quiet.latency_message_ratio.abs() < f64::EPSILON);
        assert!(quiet.latency_device_ratio.abs() < f64::EPSILON);
        assert!(quiet.severity.abs() < f64::EPSILON);
        assert!(!quiet.severity.is_nan());
    }

    #[test]
    fn thirty_late_of_hundred_from_one_device() {
        let mut reports: Vec<_> = (0..70).map(|_| classified("D1", Some("Depot"), 1)).collect();
        reports.extend((0..30).map(|_| classified("D1", Some("Depot"), 24)));

        let stats = aggregate_stats(["Depot"], &reports, threshold());
        let depot = &stats[0];

        assert_eq!(depot.total_messages, 100);
        assert_eq!(depot.total_devices, 1);
        assert_eq!(depot.latency_messages, 30);
        assert_eq!(depot.latency_devices, 1);
        assert!((depot.latency_message_ratio - 30.0).abs() < f64::EPSILON);
        assert!((depot.latency_device_ratio - 100.0).abs() < f64::EPSILON);
        assert_eq!(depot.device_ids, BTreeSet::from(["D1".to_string()]));
        assert_eq!(depot.latency_device_ids, depot.device_ids);
    }

    #[test]
    fn threshold_is_inclusive() {
        let reports = vec![
            classified("A", Some("G"), 24),
            classified("B", Some("G"), 23),
        ];
        let stats = aggregate_stats(["G"], &reports, threshold());
        assert_eq!(stats[0].latency_messages, 1);
        assert_eq!(
            stats[0].latency_device_ids,
            BTreeSet::from(["A".to_string()])
        );
    }

    #[test]
    fn unknown_and_missing_geofences_are_ignored() {
        let reports = vec![
            classified("A", None, 48),
            classified("B", Some("Elsewhere"), 48),
        ];
        let stats = aggregate_stats(["G"], &reports, threshold());
        assert_eq!(stats[0].total_messages, 0);
    }

    #[test]
    fn single_report_batch_has_zero_severity() {
        let reports = vec![classified("A", Some("G"), 48)];
        let stats = aggregate_stats(["G"], &reports, threshold());
        assert!((stats[0].latency_message_ratio - 100.0).abs() < f64::EPSILON);
        assert!(stats[0].severity.abs() < f64::EPSILON);
    }

    #[test]
    fn busiest_late_geofence_scores_full_average() {
        let mut reports: Vec<_> = (0..10).map(|_| classified("A", Some("Busy"), 48)).collect();
        reports.extend((0..10).map(|_| classified("B", Some("Busy"), 48)));
        reports.push(classified("C", Some("Quiet"), 48));

        let stats = aggregate_stats(["Busy", "Quiet"], &reports, threshold());
        // 20 messages x 2 devices against a max of 40: log10(40.1)/log10(40).
        assert!((stats[0].severity - 100.1).abs() < 1e-9);
        assert!(stats[1].severity < stats[0].severity);
        assert!(stats[1].severity > 0.0);
    }

    #[test]
    fn severity_never_decreases_with_latency_ratio() {
        let mut previous = 0.0;
        for step in 0..=100_u32 {
            let ratio = f64::from(step);
            let current = severity(ratio, 50.0, 12, 400);
            assert!(current >= previous, "{current} < {previous} at {ratio}");
            previous = current;
        }
    }

    #[test]
    fn degenerate_batch_maximum_gives_zero() {
        assert!(severity(100.0, 100.0, 1, 1).abs() < f64::EPSILON);
        assert!(severity(100.0, 100.0, 0, 0).abs() < f64::EPSILON);
    }
}
