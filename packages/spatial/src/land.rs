//! Land/sea classification against a buffered land-mass geometry.
//!
//! Land polygons are dilated by a planar buffer measured in coordinate
//! degrees, then loaded into an R-tree. A point is on land when any
//! buffered polygon contains it; everything else, including points when no
//! land geometry is loaded at all, is at sea.
//!
//! Land geometry follows the `GeoJSON` convention (`x = lon`, `y = lat`).

use geo::{BoundingRect, Buffer, Contains, MultiPolygon, Point, Polygon};
use geojson::GeoJson;
use latency_map_models::LatLon;
use rstar::{AABB, RTree, RTreeObject};

use crate::SpatialError;

/// Default dilation of land polygons, in degrees.
pub const DEFAULT_LAND_BUFFER_DEGREES: f64 = 0.1;

/// A buffered land polygon stored in the R-tree.
struct LandEntry {
    envelope: AABB<[f64; 2]>,
    polygon: Polygon<f64>,
}

impl RTreeObject for LandEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Buffered land geometry indexed for point lookups.
pub struct LandMask {
    tree: RTree<LandEntry>,
}

impl LandMask {
    /// Buffers every polygon of `land` by `buffer_degrees` and indexes the
    /// results. A zero buffer indexes the polygons unchanged.
    #[must_use]
    pub fn new(land: &MultiPolygon<f64>, buffer_degrees: f64) -> Self {
        let mut entries = Vec::new();

        for polygon in &land.0 {
            if buffer_degrees.abs() < f64::EPSILON {
                entries.extend(land_entry(polygon.clone()));
            } else {
                let buffered = polygon.buffer(buffer_degrees);
                entries.extend(buffered.0.into_iter().filter_map(land_entry));
            }
        }

        log::info!(
            "Indexed {} land polygons (buffer {buffer_degrees} degrees)",
            entries.len()
        );

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Parses land geometry from a `GeoJSON` document and buffers it.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::LandGeometry`] if the document is not valid
    /// `GeoJSON` or contains no polygonal geometry.
    pub fn from_geojson_str(geojson: &str, buffer_degrees: f64) -> Result<Self, SpatialError> {
        let land = parse_land_geojson(geojson)?;
        Ok(Self::new(&land, buffer_degrees))
    }

    /// Number of buffered polygons in the mask.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Whether any buffered land polygon contains the point.
    #[must_use]
    pub fn is_on_land(&self, point: LatLon) -> bool {
        let query = AABB::from_point([point.lon, point.lat]);
        let test_point = Point::new(point.lon, point.lat);

        self.tree
            .locate_in_envelope_intersecting(&query)
            .any(|entry| entry.polygon.contains(&test_point))
    }

    #[must_use]
    pub fn is_at_sea(&self, point: LatLon) -> bool {
        !self.is_on_land(point)
    }

    /// At-sea flag for every point, in input order.
    #[must_use]
    pub fn classify_points(&self, points: &[LatLon]) -> Vec<bool> {
        points.iter().map(|&p| self.is_at_sea(p)).collect()
    }
}

/// Parses a `GeoJSON` geometry, feature, or feature collection into one
/// [`MultiPolygon`]. Non-polygonal members are skipped.
///
/// # Errors
///
/// Returns [`SpatialError::LandGeometry`] if the text is not `GeoJSON` or
/// no polygon was found.
pub fn parse_land_geojson(geojson: &str) -> Result<MultiPolygon<f64>, SpatialError> {
    let parsed: GeoJson = geojson.parse().map_err(|e| SpatialError::LandGeometry {
        message: format!("invalid GeoJSON: {e}"),
    })?;

    let geometries: Vec<geojson::Geometry> = match parsed {
        GeoJson::Geometry(geom) => vec![geom],
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .collect(),
    };

    let mut polygons = Vec::new();
    for geom in geometries {
        match geo::Geometry::<f64>::try_from(geom) {
            Ok(geo::Geometry::Polygon(p)) => polygons.push(p),
            Ok(geo::Geometry::MultiPolygon(mp)) => polygons.extend(mp.0),
            Ok(_) => log::warn!("Skipping non-polygonal land geometry"),
            Err(e) => log::warn!("Skipping unconvertible land geometry: {e}"),
        }
    }

    if polygons.is_empty() {
        return Err(SpatialError::LandGeometry {
            message: "no polygon or multipolygon geometry found".to_string(),
        });
    }

    Ok(MultiPolygon(polygons))
}

fn land_entry(polygon: Polygon<f64>) -> Option<LandEntry> {
    let rect = polygon.bounding_rect()?;
    Some(LandEntry {
        envelope: AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        ),
        polygon,
    })
}
