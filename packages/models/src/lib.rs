#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model for the geofence latency toolchain.
//!
//! Geofence definitions, GPS burst reports (raw and classified), and the
//! per-geofence statistics derived from one `(customer, month)` batch.
//!
//! # Coordinate conventions
//!
//! Two axis orders coexist and must not be mixed up:
//!
//! * Polygon rings and report points are `(lat, lon)` pairs ([`LatLon`]).
//! * Bounding boxes and spatial index queries are `(lon, lat)` ordered
//!   ([`BoundingBox::min_corner`] / [`BoundingBox::max_corner`]).
//!
//! Every conversion between the two goes through the helpers on these
//! types so that the ordering is named at each call site.

pub mod month;

use std::collections::BTreeSet;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use month::{InvalidYearMonthError, YearMonth};

/// A single `(lat, lon)` coordinate in raw degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl LatLon {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// The point as a `(lon, lat)` corner, matching the index axis order.
    #[must_use]
    pub const fn index_corner(self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Axis-aligned bounding box stored in index order:
/// `(min_lon, min_lat, max_lon, max_lat)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Computes the exact min/max box of a `(lat, lon)` ring.
    ///
    /// Returns `None` for an empty ring.
    #[must_use]
    pub fn from_ring(ring: &[LatLon]) -> Option<Self> {
        let first = ring.first()?;
        let mut bbox = Self {
            min_lon: first.lon,
            min_lat: first.lat,
            max_lon: first.lon,
            max_lat: first.lat,
        };
        for point in &ring[1..] {
            bbox.min_lon = bbox.min_lon.min(point.lon);
            bbox.min_lat = bbox.min_lat.min(point.lat);
            bbox.max_lon = bbox.max_lon.max(point.lon);
            bbox.max_lat = bbox.max_lat.max(point.lat);
        }
        Some(bbox)
    }

    /// Lower `(lon, lat)` corner.
    #[must_use]
    pub const fn min_corner(&self) -> [f64; 2] {
        [self.min_lon, self.min_lat]
    }

    /// Upper `(lon, lat)` corner.
    #[must_use]
    pub const fn max_corner(&self) -> [f64; 2] {
        [self.max_lon, self.max_lat]
    }

    /// Inclusive containment of a point in the box.
    #[must_use]
    pub fn contains(&self, point: LatLon) -> bool {
        (self.min_lon..=self.max_lon).contains(&point.lon)
            && (self.min_lat..=self.max_lat).contains(&point.lat)
    }
}

/// How the flat numeric sequence of a geofence `Polygon` column is paired.
///
/// [`PolygonAxisOrder::LatLon`] is the as-built convention: tokens are read
/// as `lat1,lon1,lat2,lon2,...`. [`PolygonAxisOrder::LonLat`] reads the same
/// string as `lon1,lat1,...` for geofence exports that follow the GIS
/// convention. Both produce `(lat, lon)` rings; only the pairing differs.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PolygonAxisOrder {
    /// `lat,lon` pairs (as built).
    #[default]
    LatLon,
    /// `lon,lat` pairs.
    LonLat,
}

impl PolygonAxisOrder {
    pub const ALL: &[Self] = &[Self::LatLon, Self::LonLat];

    /// Builds a coordinate from one consumed pair of numbers.
    #[must_use]
    pub const fn pair(self, first: f64, second: f64) -> LatLon {
        match self {
            Self::LatLon => LatLon::new(first, second),
            Self::LonLat => LatLon::new(second, first),
        }
    }
}

/// One row of a customer's geofence definition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeofenceRow {
    #[serde(rename = "LocationName")]
    pub location_name: String,
    /// Flat comma-separated numeric sequence.
    #[serde(rename = "Polygon")]
    pub polygon: String,
}

impl GeofenceRow {
    #[must_use]
    pub fn new(location_name: impl Into<String>, polygon: impl Into<String>) -> Self {
        Self {
            location_name: location_name.into(),
            polygon: polygon.into(),
        }
    }
}

/// A parsed geofence polygon owned by a geofence index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofencePolygon {
    /// Ordinal position of the definition row; stable within one build.
    pub id: usize,
    pub name: String,
    /// Simple closed ring of `(lat, lon)` points, at least three long.
    pub ring: Vec<LatLon>,
    pub bounding_box: BoundingBox,
}

/// A GPS burst report as fetched from the report source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReport {
    #[serde(rename = "DeviceID")]
    pub device_id: String,
    #[serde(rename = "ReceiveTimeUTC")]
    pub receive_time: String,
    #[serde(rename = "EventTimeUTC")]
    pub event_time: String,
    #[serde(rename = "FPort", default)]
    pub f_port: Option<i64>,
    #[serde(rename = "PayloadData")]
    pub payload: String,
}

/// A report enriched with its position, latency, and classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedReport {
    pub report: RawReport,
    pub position: LatLon,
    /// `receive_time - event_time`; negative values are kept as-is.
    pub latency: TimeDelta,
    /// Name of the first geofence containing the report, if any.
    pub containing_geofence: Option<String>,
    pub is_at_sea: bool,
}

impl ClassifiedReport {
    /// Whether the report counts as late for the given threshold.
    #[must_use]
    pub fn is_late(&self, threshold: TimeDelta) -> bool {
        self.latency >= threshold
    }

    /// A report inside a land-based geofence should never be at sea.
    #[must_use]
    pub const fn is_geofence_sea_conflict(&self) -> bool {
        self.containing_geofence.is_some() && self.is_at_sea
    }
}

/// Latency statistics for one geofence over one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceStat {
    pub name: String,
    pub total_messages: u64,
    pub total_devices: u64,
    pub latency_messages: u64,
    pub latency_devices: u64,
    /// Percentage, one decimal.
    pub latency_message_ratio: f64,
    /// Percentage, one decimal.
    pub latency_device_ratio: f64,
    pub device_ids: BTreeSet<String>,
    pub latency_device_ids: BTreeSet<String>,
    pub severity: f64,
}

/// Batch-wide figures shown above the per-geofence maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total_reports: u64,
    pub unique_devices: u64,
    pub total_geofences: u64,
    pub land_reports: u64,
    /// Share of all reports that are on land, in percent.
    pub land_pct: f64,
    pub land_latency_reports: u64,
    /// Share of land reports that are late, in percent.
    pub land_latency_pct: f64,
    /// Reports inside a geofence that were also classified at sea.
    pub geofence_at_sea_conflicts: u64,
}
