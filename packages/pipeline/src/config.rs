//! Pipeline configuration.
//!
//! Every stage receives its settings from a [`PipelineConfig`]. Values come
//! from the defaults below, then an optional TOML file, then CLI flags:
//!
//! ```toml
//! customer = "Zim"
//! latency_threshold_hours = 24
//! land_buffer_degrees = 0.1
//! polygon_axis_order = "lat_lon"
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 5000
//! backoff_factor = 1.5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use latency_map_models::PolygonAxisOrder;
use latency_map_source::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Settings for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub customer: String,
    /// Reports at least this late count toward latency statistics.
    pub latency_threshold_hours: u32,
    /// Outward dilation of land polygons, in degrees.
    pub land_buffer_degrees: f64,
    /// Points classified per chunk; does not affect results.
    pub classify_batch_size: usize,
    /// Pairing of numbers in geofence polygon strings.
    pub polygon_axis_order: PolygonAxisOrder,
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/land/land.geojson`.
    pub land_geometry_path: Option<PathBuf>,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            customer: "Zim".to_string(),
            latency_threshold_hours: latency_map_analytics::DEFAULT_LATENCY_THRESHOLD_HOURS,
            land_buffer_degrees: latency_map_spatial::DEFAULT_LAND_BUFFER_DEGREES,
            classify_batch_size: latency_map_spatial::CLASSIFY_BATCH_SIZE,
            polygon_axis_order: PolygonAxisOrder::default(),
            data_dir: latency_map_database::paths::default_data_dir(),
            land_geometry_path: None,
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a config file, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the file cannot be read, is not
    /// valid configuration, or holds out-of-range values.
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| PipelineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate().map_err(|message| PipelineError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        let factor = self.retry.backoff_factor;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(format!(
                "retry.backoff_factor must be a positive finite number, got {factor}"
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn latency_threshold(&self) -> TimeDelta {
        latency_map_analytics::latency_threshold(self.latency_threshold_hours)
    }

    #[must_use]
    pub fn land_geometry_path(&self) -> PathBuf {
        self.land_geometry_path.clone().unwrap_or_else(|| {
            latency_map_database::paths::default_land_geometry_path(&self.data_dir)
        })
    }

    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        latency_map_database::paths::raw_dir(&self.data_dir)
    }
}

/// Retry settings for source calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: u64::try_from(policy.initial_delay.as_millis()).unwrap_or(u64::MAX),
            backoff_factor: policy.backoff_factor,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_factor: self.backoff_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.customer, "Zim");
        assert_eq!(config.latency_threshold(), TimeDelta::hours(24));
        assert!((config.land_buffer_degrees - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.classify_batch_size, 10_000);
        assert_eq!(config.polygon_axis_order, PolygonAxisOrder::LatLon);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay_ms, 5000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            customer = "Acme"
            polygon_axis_order = "lon_lat"
            data_dir = "/srv/latency"

            [retry]
            initial_delay_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.customer, "Acme");
        assert_eq!(config.polygon_axis_order, PolygonAxisOrder::LonLat);
        assert_eq!(config.latency_threshold_hours, 24);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.policy().initial_delay, Duration::ZERO);
        assert_eq!(
            config.land_geometry_path(),
            Path::new("/srv/latency/land/land.geojson")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<PipelineConfig>("customr = \"Zim\"").is_err());
    }

    fn write_config(name: &str, text: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("latency_map_config_{name}.toml"));
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn rejects_unusable_backoff_factor() {
        for (name, factor) in [("inf", "inf"), ("zero", "0.0"), ("negative", "-2.0"), ("nan", "nan")] {
            let path = write_config(name, &format!("[retry]\nbackoff_factor = {factor}\n"));
            match PipelineConfig::load(Some(&path)) {
                Err(PipelineError::Config { message, .. }) => {
                    assert!(message.contains("backoff_factor"), "{message}");
                }
                other => panic!("unexpected result for {factor}: {other:?}"),
            }
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn large_backoff_loads_and_stays_capped() {
        let path = write_config(
            "huge",
            "[retry]\nmax_attempts = 200\nbackoff_factor = 1e300\n",
        );
        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(
            config.retry.policy().delay_before(150),
            latency_map_source::retry::MAX_RETRY_DELAY
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_config_error() {
        let path = std::env::temp_dir().join("latency_map_no_such_config.toml");
        assert!(matches!(
            PipelineConfig::load(Some(&path)),
            Err(PipelineError::Config { .. })
        ));
    }
}
