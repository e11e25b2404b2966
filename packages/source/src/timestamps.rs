//! Timestamp column normalization and report latency.
//!
//! Exports from different systems print timestamps differently, but any
//! one column always uses a single format. The format is detected once per
//! column: the first candidate in [`TIMESTAMP_FORMATS`] that parses every
//! value wins, and mixed columns are rejected.

use chrono::{NaiveDateTime, TimeDelta};
use latency_map_models::{RawReport, YearMonth};

use crate::SourceError;

/// Accepted timestamp formats, in detection priority order.
pub const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Finds the first format that parses every value of the column.
///
/// # Errors
///
/// Returns [`SourceError::UnrecognizedTimestampFormat`] if no single
/// format parses the whole column.
pub fn detect_format<S: AsRef<str>>(
    column: &str,
    values: &[S],
) -> Result<&'static str, SourceError> {
    TIMESTAMP_FORMATS
        .iter()
        .copied()
        .find(|format| {
            values
                .iter()
                .all(|v| NaiveDateTime::parse_from_str(v.as_ref().trim(), format).is_ok())
        })
        .ok_or_else(|| SourceError::UnrecognizedTimestampFormat {
            column: column.to_string(),
            sample: values.first().map(|v| v.as_ref().to_string()),
        })
}

/// Parses a whole column with its detected format.
///
/// # Errors
///
/// Returns [`SourceError::UnrecognizedTimestampFormat`] if no single
/// format parses the whole column.
pub fn parse_column<S: AsRef<str>>(
    column: &str,
    values: &[S],
) -> Result<Vec<NaiveDateTime>, SourceError> {
    let format = detect_format(column, values)?;
    log::debug!("Column {column}: detected timestamp format {format:?}");

    values
        .iter()
        .map(|v| {
            NaiveDateTime::parse_from_str(v.as_ref().trim(), format).map_err(|_| {
                SourceError::UnrecognizedTimestampFormat {
                    column: column.to_string(),
                    sample: Some(v.as_ref().to_string()),
                }
            })
        })
        .collect()
}

/// Computes `receive - event` for every report, truncated toward zero to
/// whole milliseconds (the precision latency is persisted with).
///
/// Each time column gets its own format detection. Negative deltas (clock
/// skew, bad device clocks) are returned unchanged.
///
/// # Errors
///
/// Returns [`SourceError::UnrecognizedTimestampFormat`] if either column
/// cannot be parsed as a whole.
pub fn compute_latencies(reports: &[RawReport]) -> Result<Vec<TimeDelta>, SourceError> {
    let receive: Vec<&str> = reports.iter().map(|r| r.receive_time.as_str()).collect();
    let event: Vec<&str> = reports.iter().map(|r| r.event_time.as_str()).collect();

    let receive = parse_column("ReceiveTimeUTC", &receive)?;
    let event = parse_column("EventTimeUTC", &event)?;

    Ok(receive
        .into_iter()
        .zip(event)
        .map(|(received, happened)| {
            TimeDelta::milliseconds((received - happened).num_milliseconds())
        })
        .collect())
}

/// Keeps the reports whose event time falls inside `month`, treating
/// timestamps as UTC.
///
/// # Errors
///
/// Returns [`SourceError::UnrecognizedTimestampFormat`] if the event time
/// column cannot be parsed as a whole.
pub fn retain_month(
    reports: Vec<RawReport>,
    month: YearMonth,
) -> Result<Vec<RawReport>, SourceError> {
    let event: Vec<&str> = reports.iter().map(|r| r.event_time.as_str()).collect();
    let event = parse_column("EventTimeUTC", &event)?;
    let (start, end) = month.range();

    Ok(reports
        .into_iter()
        .zip(event)
        .filter(|(_, happened)| {
            let happened = happened.and_utc();
            start <= happened && happened < end
        })
        .map(|(report, _)| report)
        .collect())
}
