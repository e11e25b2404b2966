//! All-or-nothing saving and loading of batch artifacts.
//!
//! Every artifact is first written to a sibling `.tmp` file. Only when all
//! of them are on disk are they renamed into place, so a failed run never
//! leaves a half-written batch behind.

use std::path::{Path, PathBuf};

use latency_map_models::{ClassifiedReport, GeofenceStat, YearMonth};
use latency_map_spatial::GeofenceIndex;

use crate::{PersistError, paths, tables};

/// A set of files written together or not at all.
///
/// Staged files that were never committed are removed on drop.
#[derive(Default)]
pub struct StagedWrite {
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedWrite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `bytes` to a temporary sibling of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Io`] if the directory or file cannot be
    /// written.
    pub fn stage(&mut self, path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, bytes)?;
        self.staged.push((tmp, path.to_path_buf()));
        Ok(())
    }

    /// Renames every staged file into place.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Io`] if a rename fails; files not yet
    /// renamed are cleaned up.
    pub fn commit(mut self) -> Result<Vec<PathBuf>, PersistError> {
        let mut committed = Vec::with_capacity(self.staged.len());
        while !self.staged.is_empty() {
            let (tmp, path) = self.staged.remove(0);
            if let Err(e) = std::fs::rename(&tmp, &path) {
                let _ = std::fs::remove_file(&tmp);
                return Err(e.into());
            }
            committed.push(path);
        }
        Ok(committed)
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        for (tmp, _) in self.staged.drain(..) {
            if let Err(e) = std::fs::remove_file(&tmp) {
                log::warn!("Failed to remove staged file {}: {e}", tmp.display());
            }
        }
    }
}

/// Persists the index snapshot on its own.
///
/// # Errors
///
/// Returns [`PersistError`] if encoding or writing fails.
pub fn save_index(
    data_dir: &Path,
    customer: &str,
    index: &GeofenceIndex,
) -> Result<PathBuf, PersistError> {
    let path = paths::index_snapshot_path(data_dir, customer);
    let mut write = StagedWrite::new();
    write.stage(&path, &index.to_snapshot()?)?;
    write.commit()?;
    log::info!("Saved geofence index ({} polygons) to {}", index.len(), path.display());
    Ok(path)
}

/// Persists the index snapshot, classified reports, and statistics of one
/// `(customer, month)` batch together.
///
/// # Errors
///
/// Returns [`PersistError`] if any artifact cannot be encoded or written;
/// in that case none of them is replaced.
pub fn save_batch(
    data_dir: &Path,
    customer: &str,
    month: YearMonth,
    index: &GeofenceIndex,
    reports: &[ClassifiedReport],
    stats: &[GeofenceStat],
) -> Result<Vec<PathBuf>, PersistError> {
    let mut write = StagedWrite::new();
    write.stage(
        &paths::index_snapshot_path(data_dir, customer),
        &index.to_snapshot()?,
    )?;
    write.stage(
        &paths::classified_reports_path(data_dir, customer, month),
        &tables::write_reports(reports, customer)?,
    )?;
    write.stage(
        &paths::geofence_stats_path(data_dir, customer, month),
        &tables::write_stats(stats)?,
    )?;

    let written = write.commit()?;
    for path in &written {
        log::info!("Wrote {}", path.display());
    }
    Ok(written)
}

/// Loads a customer's index snapshot.
///
/// # Errors
///
/// Returns [`PersistError::InputNotFound`] if no snapshot exists, or
/// [`PersistError::Snapshot`] if it cannot be decoded.
pub fn load_index(data_dir: &Path, customer: &str) -> Result<GeofenceIndex, PersistError> {
    let path = paths::index_snapshot_path(data_dir, customer);
    let bytes = read_existing(&path)?;
    Ok(GeofenceIndex::from_snapshot(&bytes)?)
}

/// The persisted tables of one processed month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthArtifacts {
    pub reports: Vec<ClassifiedReport>,
    pub stats: Vec<GeofenceStat>,
}

/// Loads the classified reports and statistics of a processed month.
///
/// # Errors
///
/// Returns [`PersistError::InputNotFound`] listing every missing table, or
/// a decoding error for the first table that cannot be read.
pub fn load_month(
    data_dir: &Path,
    customer: &str,
    month: YearMonth,
) -> Result<MonthArtifacts, PersistError> {
    let reports_path = paths::classified_reports_path(data_dir, customer, month);
    let stats_path = paths::geofence_stats_path(data_dir, customer, month);

    let missing: Vec<PathBuf> = [&reports_path, &stats_path]
        .into_iter()
        .filter(|p| !p.exists())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PersistError::InputNotFound { missing });
    }

    let reports = tables::read_reports(&read_existing(&reports_path)?, customer, &reports_path)?;
    let stats = tables::read_stats(&read_existing(&stats_path)?)?;
    log::info!(
        "Loaded {} reports and {} geofence stats for {customer} {month}",
        reports.len(),
        stats.len()
    );

    Ok(MonthArtifacts { reports, stats })
}

fn read_existing(path: &Path) -> Result<Vec<u8>, PersistError> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PersistError::InputNotFound {
                missing: vec![path.to_path_buf()],
            }
        } else {
            e.into()
        }
    })
}
