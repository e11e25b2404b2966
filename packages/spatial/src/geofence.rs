//! Geofence index: polygon parsing, R-tree construction, point lookup.
//!
//! Axis order is the subtle part of this module. Rings are stored and
//! tested as `(lat, lon)`; the R-tree holds bounding boxes as
//! `(lon, lat)` and is queried with `(lon, lat)` points. The two meet only
//! through [`LatLon::index_corner`] / [`BoundingBox`] on the index side and
//! [`ring_coord`] on the containment side.
//!
//! When polygons overlap, the first containing polygon in ascending id
//! order (definition row order) wins. Area and centroid play no part.

use geo::{Contains, Coord, LineString, Point, Polygon};
use latency_map_models::{BoundingBox, GeofencePolygon, GeofenceRow, LatLon, PolygonAxisOrder};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

use crate::{PolygonParseError, SpatialError};

/// Number of points classified per chunk. Chunks share no state, so the
/// value only affects memory and progress granularity.
pub const CLASSIFY_BATCH_SIZE: usize = 10_000;

/// Bumped whenever the snapshot layout changes.
const SNAPSHOT_VERSION: u32 = 1;

/// A bounding box stored in the R-tree, keyed by polygon id.
struct GeofenceEnvelope {
    id: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for GeofenceEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// A geofence with its ring pre-built for containment tests.
struct GeofenceEntry {
    polygon: GeofencePolygon,
    shape: Polygon<f64>,
}

#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    polygons: Vec<GeofencePolygon>,
}

/// Spatial index over one customer's geofences.
///
/// Immutable once built; lookups take `&self` and the index can be shared
/// freely between threads.
pub struct GeofenceIndex {
    tree: RTree<GeofenceEnvelope>,
    /// Indexed by polygon id.
    entries: Vec<GeofenceEntry>,
}

impl GeofenceIndex {
    /// Builds the index from a geofence definition table.
    ///
    /// Polygon ids are the row ordinals, so rebuilding from the same table
    /// always yields the same index.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::MalformedPolygon`] for the first row whose
    /// `Polygon` column is not a valid ring.
    pub fn build(rows: &[GeofenceRow], order: PolygonAxisOrder) -> Result<Self, SpatialError> {
        let polygons = rows
            .iter()
            .enumerate()
            .map(|(row, def)| {
                let ring = parse_polygon(&def.polygon, order).map_err(|reason| {
                    SpatialError::MalformedPolygon {
                        row,
                        name: def.location_name.clone(),
                        reason,
                    }
                })?;
                let bounding_box = BoundingBox::from_ring(&ring).ok_or_else(|| {
                    SpatialError::MalformedPolygon {
                        row,
                        name: def.location_name.clone(),
                        reason: PolygonParseError::TooFewPoints { points: 0 },
                    }
                })?;
                Ok(GeofencePolygon {
                    id: row,
                    name: def.location_name.clone(),
                    ring,
                    bounding_box,
                })
            })
            .collect::<Result<Vec<_>, SpatialError>>()?;

        let index = Self::from_polygons(polygons);
        log::info!(
            "Built geofence index with {} polygons ({order} pairing)",
            index.len()
        );
        Ok(index)
    }

    fn from_polygons(polygons: Vec<GeofencePolygon>) -> Self {
        let envelopes = polygons
            .iter()
            .map(|p| GeofenceEnvelope {
                id: p.id,
                envelope: AABB::from_corners(
                    p.bounding_box.min_corner(),
                    p.bounding_box.max_corner(),
                ),
            })
            .collect();

        let entries = polygons
            .into_iter()
            .map(|polygon| {
                let exterior: LineString<f64> =
                    polygon.ring.iter().copied().map(ring_coord).collect();
                GeofenceEntry {
                    shape: Polygon::new(exterior, vec![]),
                    polygon,
                }
            })
            .collect();

        Self {
            tree: RTree::bulk_load(envelopes),
            entries,
        }
    }

    /// Number of geofences in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a polygon by id.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<&GeofencePolygon> {
        self.entries.get(id).map(|e| &e.polygon)
    }

    /// All polygons in id order.
    pub fn polygons(&self) -> impl Iterator<Item = &GeofencePolygon> {
        self.entries.iter().map(|e| &e.polygon)
    }

    /// Ids whose bounding box intersects the point, ascending.
    #[must_use]
    pub fn candidates(&self, point: LatLon) -> Vec<usize> {
        let query = AABB::from_point(point.index_corner());
        let mut ids: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the name of the first geofence (by id) whose ring strictly
    /// contains the point.
    #[must_use]
    pub fn lookup(&self, point: LatLon) -> Option<&str> {
        let test_point = Point::from(ring_coord(point));

        self.candidates(point)
            .into_iter()
            .map(|id| &self.entries[id])
            .find(|entry| entry.shape.contains(&test_point))
            .map(|entry| entry.polygon.name.as_str())
    }

    /// Classifies every point, in input order.
    #[must_use]
    pub fn classify_points(&self, points: &[LatLon]) -> Vec<Option<&str>> {
        self.classify_points_with(points, CLASSIFY_BATCH_SIZE, |_| {})
    }

    /// Classifies points in chunks of `batch_size`, calling `on_batch` with
    /// the size of each finished chunk.
    pub fn classify_points_with<F>(
        &self,
        points: &[LatLon],
        batch_size: usize,
        mut on_batch: F,
    ) -> Vec<Option<&str>>
    where
        F: FnMut(usize),
    {
        let mut results = Vec::with_capacity(points.len());

        for (i, chunk) in points.chunks(batch_size.max(1)).enumerate() {
            results.extend(chunk.iter().map(|&p| self.lookup(p)));
            log::debug!("Classified geofence batch {} ({} points)", i + 1, chunk.len());
            on_batch(chunk.len());
        }

        results
    }

    /// Serializes the index into an opaque snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::SnapshotEncode`] if serialization fails.
    pub fn to_snapshot(&self) -> Result<Vec<u8>, SpatialError> {
        let snapshot = IndexSnapshot {
            version: SNAPSHOT_VERSION,
            polygons: self.polygons().cloned().collect(),
        };
        Ok(rmp_serde::to_vec_named(&snapshot)?)
    }

    /// Restores an index from [`Self::to_snapshot`] output.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded, the snapshot
    /// version is unknown, or polygon ids are not the row ordinals.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, SpatialError> {
        let snapshot: IndexSnapshot = rmp_serde::from_slice(bytes)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SpatialError::CorruptSnapshot {
                message: format!(
                    "unsupported version {} (expected {SNAPSHOT_VERSION})",
                    snapshot.version
                ),
            });
        }

        for (position, polygon) in snapshot.polygons.iter().enumerate() {
            if polygon.id != position {
                return Err(SpatialError::CorruptSnapshot {
                    message: format!("polygon at position {position} has id {}", polygon.id),
                });
            }
            if polygon.ring.len() < 3 {
                return Err(SpatialError::CorruptSnapshot {
                    message: format!("polygon '{}' has fewer than 3 points", polygon.name),
                });
            }
        }

        Ok(Self::from_polygons(snapshot.polygons))
    }
}

/// Parses a flat `a1,b1,a2,b2,...` sequence into a `(lat, lon)` ring,
/// consuming two numbers at a time and pairing them per `order`.
///
/// # Errors
///
/// Returns a [`PolygonParseError`] if a token is not numeric, the count of
/// numbers is odd, or fewer than three points remain.
pub fn parse_polygon(
    polygon: &str,
    order: PolygonAxisOrder,
) -> Result<Vec<LatLon>, PolygonParseError> {
    let numbers = polygon
        .split(',')
        .map(str::trim)
        .map(|token| match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(PolygonParseError::NonNumeric {
                token: token.to_string(),
            }),
        })
        .collect::<Result<Vec<f64>, _>>()?;

    if numbers.len() % 2 != 0 {
        return Err(PolygonParseError::OddCount {
            count: numbers.len(),
        });
    }

    let ring: Vec<LatLon> = numbers
        .chunks_exact(2)
        .map(|pair| order.pair(pair[0], pair[1]))
        .collect();

    if ring.len() < 3 {
        return Err(PolygonParseError::TooFewPoints { points: ring.len() });
    }

    Ok(ring)
}

/// Containment space: `x = lat`, `y = lon`, the order rings are stored in.
const fn ring_coord(point: LatLon) -> Coord<f64> {
    Coord {
        x: point.lat,
        y: point.lon,
    }
}
