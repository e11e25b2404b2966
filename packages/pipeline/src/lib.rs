#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Monthly geofence latency pipeline.
//!
//! [`run_batch`] processes one `(customer, month)` batch through a fixed
//! sequence of [`Stage`]s:
//!
//! 1. load reports, the geofence index, and land geometry
//! 2. normalize timestamps into per-report latency
//! 3. classify every report against the geofence index
//! 4. classify every report as on land or at sea
//! 5. aggregate per-geofence statistics
//! 6. persist all artifacts together
//!
//! Any stage failure aborts the batch before anything is written.

pub mod config;
pub mod interactive;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use latency_map_database::PersistError;
use latency_map_models::{
    BatchSummary, ClassifiedReport, GeofenceStat, PolygonAxisOrder, YearMonth,
};
use latency_map_source::files::{CsvGeofenceSource, CsvReportSource, GeoJsonLandSource};
use latency_map_source::progress::{ProgressCallback, null_progress};
use latency_map_source::retry::{RetryPolicy, fetch_with_retry};
use latency_map_source::{GeofenceSource, LandSource, ReportSource, SourceError};
use latency_map_spatial::{GeofenceIndex, LandMask, SpatialError};

pub use config::{PipelineConfig, RetryConfig};

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The configuration file is missing or invalid.
    #[error("Invalid configuration in {}: {message}", .path.display())]
    Config {
        /// The configuration file.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// Reading or normalizing an input failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Building or querying spatial structures failed.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Saving or loading artifacts failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// The steps of one batch, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadInputs,
    NormalizeTimestamps,
    ClassifyGeofence,
    ClassifyLandSea,
    Aggregate,
    Persist,
}

impl Stage {
    pub const ALL: &[Self] = &[
        Self::LoadInputs,
        Self::NormalizeTimestamps,
        Self::ClassifyGeofence,
        Self::ClassifyLandSea,
        Self::Aggregate,
        Self::Persist,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LoadInputs => "Load inputs",
            Self::NormalizeTimestamps => "Normalize timestamps",
            Self::ClassifyGeofence => "Classify geofences",
            Self::ClassifyLandSea => "Classify land/sea",
            Self::Aggregate => "Aggregate statistics",
            Self::Persist => "Persist artifacts",
        }
    }
}

/// Whether a persisted geofence index may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// Load the customer's snapshot if present, build otherwise.
    #[default]
    Reuse,
    /// Always build from the geofence source.
    Rebuild,
}

/// The collaborators a batch reads from.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub reports: &'a dyn ReportSource,
    pub geofences: &'a dyn GeofenceSource,
    pub land: &'a dyn LandSource,
}

/// File-backed sources laid out under the configured data directory.
pub struct FileSources {
    reports: CsvReportSource,
    geofences: CsvGeofenceSource,
    land: GeoJsonLandSource,
}

impl FileSources {
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        let raw_dir = config.raw_dir();
        Self {
            reports: CsvReportSource::new(&raw_dir),
            geofences: CsvGeofenceSource::new(&raw_dir),
            land: GeoJsonLandSource::new(config.land_geometry_path()),
        }
    }

    #[must_use]
    pub fn sources(&self) -> Sources<'_> {
        Sources {
            reports: &self.reports,
            geofences: &self.geofences,
            land: &self.land,
        }
    }
}

/// Progress receivers for a batch.
pub struct BatchProgress {
    /// Advanced once per completed [`Stage`].
    pub stages: Arc<dyn ProgressCallback>,
    /// Advanced per classified chunk of reports.
    pub reports: Arc<dyn ProgressCallback>,
}

impl BatchProgress {
    #[must_use]
    pub fn silent() -> Self {
        Self {
            stages: null_progress(),
            reports: null_progress(),
        }
    }

    fn enter(&self, stage: Stage) {
        log::info!("{}...", stage.label());
        self.stages.set_message(stage.label().to_string());
    }

    fn complete(&self) {
        self.stages.inc(1);
    }
}

/// Everything a processed batch produced.
pub struct BatchOutput {
    pub month: YearMonth,
    pub index: GeofenceIndex,
    pub reports: Vec<ClassifiedReport>,
    pub stats: Vec<GeofenceStat>,
    pub summary: BatchSummary,
    /// Artifact files, in write order.
    pub written: Vec<PathBuf>,
}

/// Builds a geofence index from the customer's definition table.
///
/// # Errors
///
/// Returns [`PipelineError`] if the table cannot be fetched or a polygon
/// is malformed.
pub async fn build_index(
    config: &PipelineConfig,
    geofences: &dyn GeofenceSource,
    policy: &RetryPolicy,
) -> Result<GeofenceIndex, PipelineError> {
    let customer = config.customer.as_str();
    let rows = fetch_with_retry(geofences.name(), policy, || {
        geofences.fetch_geofences(customer)
    })
    .await?;
    Ok(GeofenceIndex::build(&rows, config.polygon_axis_order)?)
}

async fn obtain_index(
    config: &PipelineConfig,
    geofences: &dyn GeofenceSource,
    mode: IndexMode,
    policy: &RetryPolicy,
) -> Result<GeofenceIndex, PipelineError> {
    if mode == IndexMode::Reuse {
        match latency_map_database::load_index(&config.data_dir, &config.customer) {
            Ok(index) => {
                log::info!(
                    "Reusing geofence index for {} ({} polygons)",
                    config.customer,
                    index.len()
                );
                return Ok(index);
            }
            Err(PersistError::InputNotFound { .. }) => {
                log::info!("No geofence index for {} yet, building one", config.customer);
            }
            Err(e) => return Err(e.into()),
        }
    }
    build_index(config, geofences, policy).await
}

/// Processes one `(customer, month)` batch and persists its artifacts.
///
/// # Errors
///
/// Returns the first [`PipelineError`] raised by any stage. Nothing is
/// persisted unless every stage succeeds.
#[allow(clippy::too_many_lines)]
pub async fn run_batch(
    config: &PipelineConfig,
    month: YearMonth,
    sources: Sources<'_>,
    index_mode: IndexMode,
    progress: &BatchProgress,
) -> Result<BatchOutput, PipelineError> {
    let start = Instant::now();
    let customer = config.customer.as_str();
    let policy = config.retry.policy();
    let threshold = config.latency_threshold();
    progress.stages.set_total(Stage::ALL.len() as u64);
    log::info!("Processing {customer} {month} ({})", month.month_name());

    progress.enter(Stage::LoadInputs);
    let raw = fetch_with_retry(sources.reports.name(), &policy, || {
        sources.reports.fetch_reports(customer, month)
    })
    .await?;
    let positions = latency_map_source::parsing::extract_positions(&raw)?;
    let index = obtain_index(config, sources.geofences, index_mode, &policy).await?;
    let land = fetch_with_retry(sources.land.name(), &policy, || sources.land.fetch_land()).await?;
    let land = LandMask::new(&land, config.land_buffer_degrees);
    log::info!(
        "Loaded {} reports, {} geofences, {} land polygons",
        raw.len(),
        index.len(),
        land.len()
    );
    progress.complete();

    progress.enter(Stage::NormalizeTimestamps);
    let latencies = latency_map_source::timestamps::compute_latencies(&raw)?;
    let negative = latencies.iter().filter(|l| l.num_milliseconds() < 0).count();
    if negative > 0 {
        log::warn!("{negative} reports were received before their event time");
    }
    progress.complete();

    progress.enter(Stage::ClassifyGeofence);
    progress.reports.set_total(positions.len() as u64);
    let containing: Vec<Option<String>> = index
        .classify_points_with(&positions, config.classify_batch_size, |n| {
            progress.reports.inc(n as u64);
        })
        .into_iter()
        .map(|name| name.map(ToString::to_string))
        .collect();
    let inside = containing.iter().filter(|c| c.is_some()).count();
    progress
        .reports
        .finish(format!("{inside}/{} reports inside a geofence", positions.len()));
    progress.complete();

    progress.enter(Stage::ClassifyLandSea);
    let at_sea = land.classify_points(&positions);

    let reports: Vec<ClassifiedReport> = raw
        .into_iter()
        .zip(positions)
        .zip(latencies)
        .zip(containing)
        .zip(at_sea)
        .map(
            |((((report, position), latency), containing_geofence), is_at_sea)| ClassifiedReport {
                report,
                position,
                latency,
                containing_geofence,
                is_at_sea,
            },
        )
        .collect();

    let conflicts = reports
        .iter()
        .filter(|r| r.is_geofence_sea_conflict())
        .count();
    if conflicts > 0 {
        log::warn!(
            "{conflicts} reports lie inside a geofence but were classified at sea; \
             the land geometry or polygon axis order may be wrong"
        );
    }
    progress.complete();

    progress.enter(Stage::Aggregate);
    let stats = latency_map_analytics::aggregate_stats(
        index.polygons().map(|p| p.name.as_str()),
        &reports,
        threshold,
    );
    let summary = latency_map_analytics::summarize(&reports, index.len(), threshold);
    progress.complete();

    progress.enter(Stage::Persist);
    let written = latency_map_database::save_batch(
        &config.data_dir,
        customer,
        month,
        &index,
        &reports,
        &stats,
    )?;
    progress.complete();

    let elapsed = start.elapsed();
    progress
        .stages
        .finish(format!("{customer} {month} done in {:.1}s", elapsed.as_secs_f64()));
    log::info!(
        "Processed {} reports for {customer} {month} in {:.1}s",
        reports.len(),
        elapsed.as_secs_f64()
    );

    Ok(BatchOutput {
        month,
        index,
        reports,
        stats,
        summary,
        written,
    })
}

/// Reports that fell inside some geofence under one axis order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisOrderMatches {
    pub order: PolygonAxisOrder,
    pub matched: usize,
}

/// Outcome of [`verify_axis_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisOrderCheck {
    /// Positions classified under every order.
    pub positions: usize,
    /// One entry per [`PolygonAxisOrder::ALL`], in that order.
    pub results: Vec<AxisOrderMatches>,
}

impl AxisOrderCheck {
    /// The order with the most matches. Ties go to the earlier order;
    /// `None` when no order matched anything.
    #[must_use]
    pub fn best(&self) -> Option<PolygonAxisOrder> {
        let mut best: Option<&AxisOrderMatches> = None;
        for result in &self.results {
            if result.matched > 0 && best.is_none_or(|b| result.matched > b.matched) {
                best = Some(result);
            }
        }
        best.map(|r| r.order)
    }
}

/// Classifies a month's report positions against the customer's geofence
/// table read under every [`PolygonAxisOrder`], counting the matches for
/// each. Only the first `sample` reports are used when given.
///
/// Nothing is persisted.
///
/// # Errors
///
/// Returns [`PipelineError`] if the inputs cannot be fetched, a report has
/// no coordinates, or a polygon is malformed.
pub async fn verify_axis_order(
    config: &PipelineConfig,
    month: YearMonth,
    reports: &dyn ReportSource,
    geofences: &dyn GeofenceSource,
    sample: Option<usize>,
) -> Result<AxisOrderCheck, PipelineError> {
    let customer = config.customer.as_str();
    let policy = config.retry.policy();

    let mut raw = fetch_with_retry(reports.name(), &policy, || {
        reports.fetch_reports(customer, month)
    })
    .await?;
    if let Some(sample) = sample {
        raw.truncate(sample);
    }
    let positions = latency_map_source::parsing::extract_positions(&raw)?;
    let rows = fetch_with_retry(geofences.name(), &policy, || {
        geofences.fetch_geofences(customer)
    })
    .await?;

    let mut results = Vec::with_capacity(PolygonAxisOrder::ALL.len());
    for &order in PolygonAxisOrder::ALL {
        let index = GeofenceIndex::build(&rows, order)?;
        let matched = index
            .classify_points(&positions)
            .iter()
            .filter(|name| name.is_some())
            .count();
        log::info!(
            "{order}: {matched}/{} {customer} {month} reports inside a geofence",
            positions.len()
        );
        results.push(AxisOrderMatches { order, matched });
    }

    Ok(AxisOrderCheck {
        positions: positions.len(),
        results,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use geo::{MultiPolygon, polygon};
    use latency_map_models::{GeofenceRow, RawReport};

    use super::*;

    struct StaticReports {
        reports: Vec<RawReport>,
        failures_before_success: u32,
        calls: AtomicU32,
    }

    impl StaticReports {
        fn new(reports: Vec<RawReport>) -> Self {
            Self {
                reports,
                failures_before_success: 0,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ReportSource for StaticReports {
        fn name(&self) -> &'static str {
            "static-reports"
        }

        async fn fetch_reports(
            &self,
            _customer: &str,
            _month: YearMonth,
        ) -> Result<Vec<RawReport>, SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(SourceError::Transient {
                    message: "connection reset".to_string(),
                });
            }
            Ok(self.reports.clone())
        }
    }

    struct StaticGeofences(Option<Vec<GeofenceRow>>);

    #[async_trait]
    impl GeofenceSource for StaticGeofences {
        fn name(&self) -> &'static str {
            "static-geofences"
        }

        async fn fetch_geofences(&self, _customer: &str) -> Result<Vec<GeofenceRow>, SourceError> {
            self.0.clone().ok_or_else(|| SourceError::InputNotFound {
                path: "geofences.csv".into(),
                hint: "unavailable in this test".to_string(),
            })
        }
    }

    /// Land covering lon 0..3, lat 0..3.
    struct SquareLand;

    #[async_trait]
    impl LandSource for SquareLand {
        fn name(&self) -> &'static str {
            "square-land"
        }

        async fn fetch_land(&self) -> Result<MultiPolygon<f64>, SourceError> {
            Ok(MultiPolygon(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 3.0, y: 0.0),
                (x: 3.0, y: 3.0),
                (x: 0.0, y: 3.0),
            ]]))
        }
    }

    fn report(device: &str, lat: f64, lon: f64, receive: &str) -> RawReport {
        RawReport {
            device_id: device.to_string(),
            receive_time: receive.to_string(),
            event_time: "2024-11-02 10:00:00.000".to_string(),
            f_port: Some(2),
            payload: format!("Battery: 90%, GPS Data: {lat},{lon}"),
        }
    }

    fn batch() -> Vec<RawReport> {
        vec![
            report("D1", 1.0, 1.0, "2024-11-03 16:00:00.000"),
            report("D2", 1.0, 1.0, "2024-11-02 11:00:00.000"),
            report("D3", 5.0, 5.0, "2024-11-02 12:00:00.000"),
        ]
    }

    fn geofences() -> StaticGeofences {
        StaticGeofences(Some(vec![
            GeofenceRow::new("Zim-A", "0,0,0,2,2,2,2,0"),
            GeofenceRow::new("Zim-B", "10,10,10,12,12,12"),
        ]))
    }

    fn config(name: &str) -> PipelineConfig {
        let data_dir = std::env::temp_dir().join(format!("latency_map_pipeline_{name}"));
        let _ = std::fs::remove_dir_all(&data_dir);
        PipelineConfig {
            data_dir,
            retry: RetryConfig {
                initial_delay_ms: 0,
                ..RetryConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    fn month() -> YearMonth {
        YearMonth::new(2024, 11).unwrap()
    }

    #[tokio::test]
    async fn processes_and_persists_a_month() {
        let config = config("full");
        let mut raw = batch();
        raw[1].receive_time = "2024-11-02 10:59:59.999600".to_string();
        let reports = StaticReports::new(raw);
        let geofences = geofences();
        let sources = Sources {
            reports: &reports,
            geofences: &geofences,
            land: &SquareLand,
        };

        let output = run_batch(&config, month(), sources, IndexMode::Reuse, &BatchProgress::silent())
            .await
            .unwrap();

        let names: Vec<_> = output
            .reports
            .iter()
            .map(|r| r.containing_geofence.as_deref())
            .collect();
        assert_eq!(names, vec![Some("Zim-A"), Some("Zim-A"), None]);
        assert_eq!(output.reports[1].latency, chrono::TimeDelta::milliseconds(3_599_999));
        let at_sea: Vec<_> = output.reports.iter().map(|r| r.is_at_sea).collect();
        assert_eq!(at_sea, vec![false, false, true]);

        let zim_a = &output.stats[0];
        assert_eq!(zim_a.name, "Zim-A");
        assert_eq!(zim_a.total_messages, 2);
        assert_eq!(zim_a.latency_messages, 1);
        assert!((zim_a.latency_message_ratio - 50.0).abs() < f64::EPSILON);
        assert!((zim_a.latency_device_ratio - 50.0).abs() < f64::EPSILON);
        assert_eq!(output.stats[1].total_messages, 0);

        assert_eq!(output.summary.total_reports, 3);
        assert_eq!(output.summary.total_geofences, 2);
        assert_eq!(output.summary.land_reports, 2);
        assert!((output.summary.land_pct - 66.7).abs() < 1e-9);
        assert_eq!(output.summary.geofence_at_sea_conflicts, 0);

        assert_eq!(output.written.len(), 3);
        assert!(output.written.iter().all(|p| p.exists()));

        let loaded = latency_map_database::load_month(&config.data_dir, "Zim", month()).unwrap();
        assert_eq!(loaded.reports, output.reports);
        assert_eq!(loaded.stats, output.stats);

        let _ = std::fs::remove_dir_all(&config.data_dir);
    }

    #[tokio::test]
    async fn bad_timestamps_abort_without_artifacts() {
        let config = config("bad_timestamps");
        let mut raw = batch();
        raw[1].receive_time = "02/11/2024 11:00".to_string();
        let reports = StaticReports::new(raw);
        let geofences = geofences();
        let sources = Sources {
            reports: &reports,
            geofences: &geofences,
            land: &SquareLand,
        };

        let result =
            run_batch(&config, month(), sources, IndexMode::Reuse, &BatchProgress::silent()).await;

        assert!(matches!(
            result,
            Err(PipelineError::Source(SourceError::UnrecognizedTimestampFormat { .. }))
        ));
        assert!(!latency_map_database::paths::processed_dir(&config.data_dir).exists());
    }

    #[tokio::test]
    async fn missing_coordinates_abort_the_batch() {
        let config = config("no_gps");
        let mut raw = batch();
        raw[2].payload = "heartbeat".to_string();
        let reports = StaticReports::new(raw);
        let geofences = geofences();
        let sources = Sources {
            reports: &reports,
            geofences: &geofences,
            land: &SquareLand,
        };

        let result =
            run_batch(&config, month(), sources, IndexMode::Reuse, &BatchProgress::silent()).await;

        assert!(matches!(
            result,
            Err(PipelineError::Source(SourceError::CoordinateExtraction { row: 2, .. }))
        ));
    }

    #[tokio::test]
    async fn transient_report_failures_are_retried() {
        let config = config("flaky");
        let reports = StaticReports {
            failures_before_success: 2,
            ..StaticReports::new(batch())
        };
        let geofences = geofences();
        let sources = Sources {
            reports: &reports,
            geofences: &geofences,
            land: &SquareLand,
        };

        let output = run_batch(&config, month(), sources, IndexMode::Reuse, &BatchProgress::silent())
            .await
            .unwrap();

        assert_eq!(output.reports.len(), 3);
        assert_eq!(reports.calls.load(Ordering::SeqCst), 3);
        let _ = std::fs::remove_dir_all(&config.data_dir);
    }

    #[tokio::test]
    async fn persisted_index_is_reused_unless_rebuilding() {
        let config = config("reuse");
        let reports = StaticReports::new(batch());
        let geofences = geofences();
        run_batch(
            &config,
            month(),
            Sources {
                reports: &reports,
                geofences: &geofences,
                land: &SquareLand,
            },
            IndexMode::Reuse,
            &BatchProgress::silent(),
        )
        .await
        .unwrap();

        let unavailable = StaticGeofences(None);
        let sources = Sources {
            reports: &reports,
            geofences: &unavailable,
            land: &SquareLand,
        };

        let reused = run_batch(&config, month(), sources, IndexMode::Reuse, &BatchProgress::silent())
            .await
            .unwrap();
        assert_eq!(reused.index.len(), 2);
        assert_eq!(
            reused.reports[0].containing_geofence.as_deref(),
            Some("Zim-A")
        );

        let rebuilt =
            run_batch(&config, month(), sources, IndexMode::Rebuild, &BatchProgress::silent()).await;
        assert!(matches!(
            rebuilt,
            Err(PipelineError::Source(SourceError::InputNotFound { .. }))
        ));
        let _ = std::fs::remove_dir_all(&config.data_dir);
    }

    #[tokio::test]
    async fn geofence_at_sea_is_counted_not_fatal() {
        let config = config("conflict");
        let reports = StaticReports::new(vec![report("D1", 5.5, 5.5, "2024-11-02 11:00:00.000")]);
        let geofences = StaticGeofences(Some(vec![GeofenceRow::new(
            "Offshore",
            "5,5,5,6,6,6,6,5",
        )]));
        let sources = Sources {
            reports: &reports,
            geofences: &geofences,
            land: &SquareLand,
        };

        let output = run_batch(&config, month(), sources, IndexMode::Rebuild, &BatchProgress::silent())
            .await
            .unwrap();

        assert_eq!(output.summary.geofence_at_sea_conflicts, 1);
        assert!(output.reports[0].is_geofence_sea_conflict());
        let _ = std::fs::remove_dir_all(&config.data_dir);
    }

    /// Zimbabwe-sized box written as `lon,lat` pairs.
    fn lon_lat_geofences() -> StaticGeofences {
        StaticGeofences(Some(vec![
            GeofenceRow::new("Harare", "30,-18,30,-16,32,-16,32,-18"),
            GeofenceRow::new("Bulawayo", "28,-21,28,-19,29,-19,29,-21"),
        ]))
    }

    #[tokio::test]
    async fn lon_lat_table_matches_more_under_lon_lat() {
        let config = config("axis_order");
        let reports = StaticReports::new(vec![
            report("D1", -17.0, 31.0, "2024-11-02 11:00:00.000"),
            report("D2", -17.5, 30.5, "2024-11-02 11:00:00.000"),
            report("D3", -20.0, 28.5, "2024-11-02 11:00:00.000"),
            report("D4", 1.0, 1.0, "2024-11-02 11:00:00.000"),
        ]);

        let check = verify_axis_order(&config, month(), &reports, &lon_lat_geofences(), None)
            .await
            .unwrap();

        assert_eq!(check.positions, 4);
        assert_eq!(
            check.results,
            vec![
                AxisOrderMatches {
                    order: PolygonAxisOrder::LatLon,
                    matched: 0,
                },
                AxisOrderMatches {
                    order: PolygonAxisOrder::LonLat,
                    matched: 3,
                },
            ]
        );
        assert_eq!(check.best(), Some(PolygonAxisOrder::LonLat));
        assert!(!config.data_dir.exists());
    }

    #[tokio::test]
    async fn axis_order_check_honours_sample_size() {
        let config = config("axis_order_sample");
        let reports = StaticReports::new(vec![
            report("D1", 1.0, 1.0, "2024-11-02 11:00:00.000"),
            report("D2", -17.0, 31.0, "2024-11-02 11:00:00.000"),
        ]);

        let check = verify_axis_order(&config, month(), &reports, &lon_lat_geofences(), Some(1))
            .await
            .unwrap();

        assert_eq!(check.positions, 1);
        assert!(check.results.iter().all(|r| r.matched == 0));
        assert_eq!(check.best(), None);
    }

    #[test]
    fn axis_order_tie_prefers_earlier_order() {
        let check = AxisOrderCheck {
            positions: 4,
            results: vec![
                AxisOrderMatches {
                    order: PolygonAxisOrder::LatLon,
                    matched: 2,
                },
                AxisOrderMatches {
                    order: PolygonAxisOrder::LonLat,
                    matched: 2,
                },
            ],
        };
        assert_eq!(check.best(), Some(PolygonAxisOrder::LatLon));
    }

    #[test]
    fn stages_run_in_documented_order() {
        let labels: Vec<_> = Stage::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(
            labels,
            vec![
                "Load inputs",
                "Normalize timestamps",
                "Classify geofences",
                "Classify land/sea",
                "Aggregate statistics",
                "Persist artifacts",
            ]
        );
    }
}
