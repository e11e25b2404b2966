#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial indexes for GPS report classification.
//!
//! [`GeofenceIndex`] parses a customer's geofence definitions, builds an
//! R-tree over their bounding boxes, and answers "which geofence contains
//! this point" with exact point-in-polygon tests. [`LandMask`] buffers a
//! land-mass multi-polygon and flags points that fall outside it as being
//! at sea.

pub mod geofence;
pub mod land;

pub use geofence::{CLASSIFY_BATCH_SIZE, GeofenceIndex, parse_polygon};
pub use land::{DEFAULT_LAND_BUFFER_DEGREES, LandMask, parse_land_geojson};

/// Errors raised while building, persisting, or loading spatial indexes.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// A geofence `Polygon` column could not be parsed into a ring.
    #[error("Malformed polygon for geofence '{name}' (row {row}): {reason}")]
    MalformedPolygon {
        /// Ordinal of the definition row.
        row: usize,
        /// Geofence name on that row.
        name: String,
        /// What was wrong with the coordinate sequence.
        reason: PolygonParseError,
    },

    /// Index snapshot could not be serialized.
    #[error("Index snapshot encode error: {0}")]
    SnapshotEncode(#[from] rmp_serde::encode::Error),

    /// Index snapshot could not be deserialized.
    #[error("Index snapshot decode error: {0}")]
    SnapshotDecode(#[from] rmp_serde::decode::Error),

    /// Snapshot decoded but its contents are inconsistent.
    #[error("Corrupt index snapshot: {message}")]
    CorruptSnapshot {
        /// Description of the inconsistency.
        message: String,
    },

    /// Land geometry could not be read.
    #[error("Land geometry error: {message}")]
    LandGeometry {
        /// Description of what went wrong.
        message: String,
    },
}

/// Reasons a flat coordinate sequence is not a valid ring.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolygonParseError {
    /// Coordinates must come in pairs.
    #[error("odd number of coordinates ({count})")]
    OddCount {
        /// Number of numeric tokens found.
        count: usize,
    },

    /// A token is not a finite number.
    #[error("non-numeric token '{token}'")]
    NonNumeric {
        /// The offending token.
        token: String,
    },

    /// Fewer than three points cannot enclose an area.
    #[error("ring has {points} points, at least 3 required")]
    TooFewPoints {
        /// Number of points parsed.
        points: usize,
    },
}
