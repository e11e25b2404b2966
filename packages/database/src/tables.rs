//! CSV encodings of the classified report and geofence statistics tables.
//!
//! The report table carries the original report columns followed by
//! `Lat, Lon, latencyDelta, in_<customer>_polygon, in_Sea`. Latency is
//! written in seconds with millisecond precision. Geofence statistics are
//! one row per geofence with device id sets joined by `;`.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use chrono::TimeDelta;
use csv::StringRecord;
use latency_map_models::{ClassifiedReport, GeofenceStat, LatLon, RawReport};
use serde::{Deserialize, Serialize};

use crate::PersistError;

const ID_SEPARATOR: &str = ";";

/// Column holding the containing geofence name for `customer`.
#[must_use]
pub fn polygon_column(customer: &str) -> String {
    format!("in_{customer}_polygon")
}

/// Formats a latency as signed seconds with three decimals.
#[must_use]
pub fn format_latency(latency: TimeDelta) -> String {
    let ms = latency.num_milliseconds();
    let sign = if ms < 0 { "-" } else { "" };
    let abs = ms.unsigned_abs();
    format!("{sign}{}.{:03}", abs / 1000, abs % 1000)
}

/// Parses a latency written by [`format_latency`].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_latency(value: &str) -> Option<TimeDelta> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    TimeDelta::try_milliseconds((seconds * 1000.0).round() as i64)
}

/// Encodes classified reports as CSV.
///
/// # Errors
///
/// Returns [`PersistError`] if a record cannot be written.
pub fn write_reports(reports: &[ClassifiedReport], customer: &str) -> Result<Vec<u8>, PersistError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "DeviceID",
        "ReceiveTimeUTC",
        "EventTimeUTC",
        "FPort",
        "PayloadData",
        "Lat",
        "Lon",
        "latencyDelta",
        polygon_column(customer).as_str(),
        "in_Sea",
    ])?;

    for r in reports {
        let f_port = r.report.f_port.map(|p| p.to_string()).unwrap_or_default();
        writer.write_record([
            r.report.device_id.as_str(),
            r.report.receive_time.as_str(),
            r.report.event_time.as_str(),
            f_port.as_str(),
            r.report.payload.as_str(),
            r.position.lat.to_string().as_str(),
            r.position.lon.to_string().as_str(),
            format_latency(r.latency).as_str(),
            r.containing_geofence.as_deref().unwrap_or(""),
            if r.is_at_sea { "True" } else { "False" },
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| PersistError::Io(e.into_error()))
}

/// Header lookup for tables read by column name.
struct Columns {
    positions: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Self {
            positions: headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_string(), i))
                .collect(),
        }
    }

    fn get<'r>(
        &self,
        record: &'r StringRecord,
        name: &str,
        path: &Path,
        row: usize,
    ) -> Result<&'r str, PersistError> {
        self.positions
            .get(name)
            .and_then(|&i| record.get(i))
            .ok_or_else(|| malformed(path, row, format!("missing column {name}")))
    }
}

fn malformed(path: &Path, row: usize, message: String) -> PersistError {
    PersistError::MalformedRow {
        path: path.to_path_buf(),
        row,
        message,
    }
}

fn parse_field<T: std::str::FromStr>(
    value: &str,
    name: &str,
    path: &Path,
    row: usize,
) -> Result<T, PersistError> {
    value
        .trim()
        .parse()
        .map_err(|_| malformed(path, row, format!("invalid {name}: {value:?}")))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Decodes a classified report table written by [`write_reports`].
///
/// # Errors
///
/// Returns [`PersistError::MalformedRow`] for missing columns or invalid
/// values, or [`PersistError::Csv`] if the CSV itself is broken.
pub fn read_reports(
    bytes: &[u8],
    customer: &str,
    path: &Path,
) -> Result<Vec<ClassifiedReport>, PersistError> {
    let mut reader = csv::Reader::from_reader(bytes);
    let columns = Columns::new(reader.headers()?);
    let polygon = polygon_column(customer);

    let mut reports = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 1;
        let get = |name: &str| columns.get(&record, name, path, row);

        let f_port = match get("FPort")?.trim() {
            "" => None,
            v => Some(parse_field(v, "FPort", path, row)?),
        };
        let latency_text = get("latencyDelta")?;
        let latency = parse_latency(latency_text)
            .ok_or_else(|| malformed(path, row, format!("invalid latencyDelta: {latency_text:?}")))?;
        let sea_text = get("in_Sea")?;
        let is_at_sea = parse_bool(sea_text)
            .ok_or_else(|| malformed(path, row, format!("invalid in_Sea: {sea_text:?}")))?;
        let geofence = get(polygon.as_str())?;

        reports.push(ClassifiedReport {
            report: RawReport {
                device_id: get("DeviceID")?.to_string(),
                receive_time: get("ReceiveTimeUTC")?.to_string(),
                event_time: get("EventTimeUTC")?.to_string(),
                f_port,
                payload: get("PayloadData")?.to_string(),
            },
            position: LatLon::new(
                parse_field(get("Lat")?, "Lat", path, row)?,
                parse_field(get("Lon")?, "Lon", path, row)?,
            ),
            latency,
            containing_geofence: (!geofence.is_empty()).then(|| geofence.to_string()),
            is_at_sea,
        });
    }

    Ok(reports)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatRow {
    #[serde(rename = "LocationName")]
    name: String,
    total_messages: u64,
    total_devices: u64,
    latency_messages: u64,
    latency_devices: u64,
    latency_message_ratio: f64,
    latency_device_ratio: f64,
    device_ids: String,
    latency_device_ids: String,
    severity: f64,
}

fn join_ids(ids: &BTreeSet<String>) -> String {
    ids.iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(ID_SEPARATOR)
}

fn split_ids(joined: &str) -> BTreeSet<String> {
    joined
        .split(ID_SEPARATOR)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl From<&GeofenceStat> for StatRow {
    fn from(stat: &GeofenceStat) -> Self {
        Self {
            name: stat.name.clone(),
            total_messages: stat.total_messages,
            total_devices: stat.total_devices,
            latency_messages: stat.latency_messages,
            latency_devices: stat.latency_devices,
            latency_message_ratio: stat.latency_message_ratio,
            latency_device_ratio: stat.latency_device_ratio,
            device_ids: join_ids(&stat.device_ids),
            latency_device_ids: join_ids(&stat.latency_device_ids),
            severity: stat.severity,
        }
    }
}

impl From<StatRow> for GeofenceStat {
    fn from(row: StatRow) -> Self {
        Self {
            name: row.name,
            total_messages: row.total_messages,
            total_devices: row.total_devices,
            latency_messages: row.latency_messages,
            latency_devices: row.latency_devices,
            latency_message_ratio: row.latency_message_ratio,
            latency_device_ratio: row.latency_device_ratio,
            device_ids: split_ids(&row.device_ids),
            latency_device_ids: split_ids(&row.latency_device_ids),
            severity: row.severity,
        }
    }
}

/// Encodes geofence statistics as CSV.
///
/// # Errors
///
/// Returns [`PersistError`] if a record cannot be written.
pub fn write_stats(stats: &[GeofenceStat]) -> Result<Vec<u8>, PersistError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for stat in stats {
        writer.serialize(StatRow::from(stat))?;
    }
    writer
        .into_inner()
        .map_err(|e| PersistError::Io(e.into_error()))
}

/// Decodes a statistics table written by [`write_stats`].
///
/// # Errors
///
/// Returns [`PersistError::Csv`] if a row does not match the table layout.
pub fn read_stats(bytes: &[u8]) -> Result<Vec<GeofenceStat>, PersistError> {
    csv::Reader::from_reader(bytes)
        .deserialize::<StatRow>()
        .map(|row| row.map(GeofenceStat::from).map_err(PersistError::from))
        .collect()
}
