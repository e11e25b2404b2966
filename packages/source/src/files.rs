//! File-backed sources.
//!
//! Monthly report exports and geofence tables are CSV files under the raw
//! data directory; land geometry is a `GeoJSON` file.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use geo::MultiPolygon;
use latency_map_models::{GeofenceRow, RawReport, YearMonth};
use serde::de::DeserializeOwned;

use crate::{GeofenceSource, LandSource, ReportSource, SourceError};

/// Reads `gps_data_<customer>_<YYYY>_<MM>.csv` exports.
pub struct CsvReportSource {
    raw_dir: PathBuf,
}

impl CsvReportSource {
    #[must_use]
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
        }
    }

    /// Path of the export for `customer` and `month`.
    #[must_use]
    pub fn path_for(&self, customer: &str, month: YearMonth) -> PathBuf {
        let (year, month) = month.file_parts();
        self.raw_dir
            .join(format!("gps_data_{customer}_{year}_{month}.csv"))
    }
}

#[async_trait]
impl ReportSource for CsvReportSource {
    fn name(&self) -> &'static str {
        "csv-reports"
    }

    async fn fetch_reports(
        &self,
        customer: &str,
        month: YearMonth,
    ) -> Result<Vec<RawReport>, SourceError> {
        let path = self.path_for(customer, month);
        let bytes = read_input(&path, &format!("export the {month} GPS bursts first")).await?;
        let rows: Vec<RawReport> = deserialize_csv(&bytes)?;
        let read = rows.len();
        let reports = crate::timestamps::retain_month(rows, month)?;
        if reports.len() < read {
            log::warn!(
                "Dropped {} reports with event times outside {month}",
                read - reports.len()
            );
        }
        log::info!("Read {} reports from {}", reports.len(), path.display());
        Ok(reports)
    }
}

/// Reads `geofences_<customer>.csv` definition tables.
pub struct CsvGeofenceSource {
    raw_dir: PathBuf,
}

impl CsvGeofenceSource {
    #[must_use]
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
        }
    }

    #[must_use]
    pub fn path_for(&self, customer: &str) -> PathBuf {
        self.raw_dir.join(format!("geofences_{customer}.csv"))
    }
}

#[async_trait]
impl GeofenceSource for CsvGeofenceSource {
    fn name(&self) -> &'static str {
        "csv-geofences"
    }

    async fn fetch_geofences(&self, customer: &str) -> Result<Vec<GeofenceRow>, SourceError> {
        let path = self.path_for(customer);
        let bytes = read_input(&path, "export the customer's geofence table first").await?;
        let rows: Vec<GeofenceRow> = deserialize_csv(&bytes)?;
        log::info!("Read {} geofence definitions from {}", rows.len(), path.display());
        Ok(rows)
    }
}

/// Reads land geometry from a `GeoJSON` file.
pub struct GeoJsonLandSource {
    path: PathBuf,
}

impl GeoJsonLandSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LandSource for GeoJsonLandSource {
    fn name(&self) -> &'static str {
        "geojson-land"
    }

    async fn fetch_land(&self) -> Result<MultiPolygon<f64>, SourceError> {
        let bytes = read_input(&self.path, "download a land polygon dataset as GeoJSON").await?;
        let text = String::from_utf8(bytes)
            .map_err(|e| SourceError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        let land = latency_map_spatial::parse_land_geojson(&text)?;
        log::info!(
            "Loaded {} land polygons from {}",
            land.0.len(),
            self.path.display()
        );
        Ok(land)
    }
}

/// Reads a whole input file, mapping a missing file to
/// [`SourceError::InputNotFound`].
async fn read_input(path: &Path, hint: &str) -> Result<Vec<u8>, SourceError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SourceError::InputNotFound {
            path: path.to_path_buf(),
            hint: hint.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Deserializes CSV rows by header name. Unknown columns are ignored.
fn deserialize_csv<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, SourceError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(bytes);
    reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(SourceError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("latency_map_source_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_monthly_report_export() {
        let dir = test_dir("reports");
        std::fs::write(
            dir.join("gps_data_Zim_2024_11.csv"),
            "DeviceID,ReceiveTimeUTC,EventTimeUTC,FPort,PayloadData,Extra\n\
             A1,2024-11-02 10:00:00.000,2024-11-02 09:00:00.000,2,\"GPS Data: 1.5,1.5\",x\n\
             A2,2024-11-03 10:00:00.000,2024-11-02 09:00:00.000,,\"GPS Data: 0,0\",y\n",
        )
        .unwrap();

        let source = CsvReportSource::new(&dir);
        let month = YearMonth::new(2024, 11).unwrap();
        let reports = source.fetch_reports("Zim", month).await.unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].device_id, "A1");
        assert_eq!(reports[0].f_port, Some(2));
        assert_eq!(reports[0].payload, "GPS Data: 1.5,1.5");
        assert_eq!(reports[1].f_port, None);
    }

    #[tokio::test]
    async fn export_is_limited_to_its_month() {
        let dir = test_dir("month_window");
        std::fs::write(
            dir.join("gps_data_Zim_2024_11.csv"),
            "DeviceID,ReceiveTimeUTC,EventTimeUTC,FPort,PayloadData\n\
             A1,2024-11-01 02:00:00.000,2024-10-31 23:00:00.000,2,\"GPS Data: 1,1\"\n\
             A2,2024-11-02 10:00:00.000,2024-11-02 09:00:00.000,2,\"GPS Data: 1,1\"\n\
             A3,2024-12-01 01:00:00.000,2024-12-01 00:00:00.000,2,\"GPS Data: 1,1\"\n",
        )
        .unwrap();

        let source = CsvReportSource::new(&dir);
        let month = YearMonth::new(2024, 11).unwrap();
        let reports = source.fetch_reports("Zim", month).await.unwrap();

        let devices: Vec<_> = reports.iter().map(|r| r.device_id.as_str()).collect();
        assert_eq!(devices, vec!["A2"]);
    }

    #[tokio::test]
    async fn missing_export_is_input_not_found() {
        let dir = test_dir("missing");
        let source = CsvReportSource::new(&dir);
        let month = YearMonth::new(2024, 1).unwrap();

        match source.fetch_reports("Zim", month).await {
            Err(SourceError::InputNotFound { path, .. }) => {
                assert_eq!(path, dir.join("gps_data_Zim_2024_01.csv"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reads_geofence_table_in_row_order() {
        let dir = test_dir("geofences");
        std::fs::write(
            dir.join("geofences_Zim.csv"),
            "LocationName,Polygon\n\
             Depot,\"0,0,0,2,2,2,2,0\"\n\
             Yard,\"5,5,5,6,6,6\"\n",
        )
        .unwrap();

        let rows = CsvGeofenceSource::new(&dir)
            .fetch_geofences("Zim")
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                GeofenceRow::new("Depot", "0,0,0,2,2,2,2,0"),
                GeofenceRow::new("Yard", "5,5,5,6,6,6"),
            ]
        );
    }

    #[tokio::test]
    async fn reads_land_geojson() {
        let dir = test_dir("land");
        let path = dir.join("land.geojson");
        std::fs::write(
            &path,
            r#"{"type":"Polygon","coordinates":[[[0,0],[10,0],[10,10],[0,10],[0,0]]]}"#,
        )
        .unwrap();

        let land = GeoJsonLandSource::new(&path).fetch_land().await.unwrap();
        assert_eq!(land.0.len(), 1);
    }

    #[tokio::test]
    async fn invalid_land_geojson_is_geometry_error() {
        let dir = test_dir("bad_land");
        let path = dir.join("land.geojson");
        std::fs::write(&path, r#"{"type":"Point","coordinates":[1,2]}"#).unwrap();

        let result = GeoJsonLandSource::new(&path).fetch_land().await;
        assert!(matches!(result, Err(SourceError::Geometry(_))));
    }
}
