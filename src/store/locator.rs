//! Partitioned report store.
//!
//! Stored reports live in one of two partitions under the data directory:
//! `unapproved` for reports awaiting a go-ahead and `approved` for reports
//! eligible for delivery. A report's partition is determined solely by the
//! directory it sits in; approval is a rename between partitions.

use crate::store::filename;
use std::path::{Path, PathBuf};
use tracing::warn;

/// The two report partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// Reports waiting for approval
    Unapproved,
    /// Reports cleared for delivery
    Approved,
}

impl Partition {
    /// Directory name for this partition.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Partition::Unapproved => "unapproved",
            Partition::Approved => "approved",
        }
    }

    /// Resolve this partition's directory under a data root.
    pub fn resolve(&self, base: &Path) -> PathBuf {
        base.join(self.dir_name())
    }
}

/// Report store errors.
#[derive(Debug)]
pub enum StoreError {
    IoError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::IoError(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Locates report files within the partitioned store.
#[derive(Debug, Clone)]
pub struct ReportLocator {
    data_path: PathBuf,
}

impl ReportLocator {
    /// Create a locator rooted at the given data directory.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
        }
    }

    /// The data directory this locator is rooted at.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Directory of a partition. The directory may not exist yet.
    pub fn dir(&self, partition: Partition) -> PathBuf {
        partition.resolve(&self.data_path)
    }

    /// Create both partition directories if they are missing.
    pub fn ensure_partitions(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(self.dir(Partition::Unapproved))
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        std::fs::create_dir_all(self.dir(Partition::Approved))
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        Ok(())
    }

    /// List the report files in a partition, sorted by filename.
    ///
    /// Non-report files are ignored. A missing partition directory yields an
    /// empty list.
    pub fn reports(&self, partition: Partition) -> Vec<PathBuf> {
        let dir = self.dir(partition);
        let mut files: Vec<PathBuf> = match std::fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map(filename::is_report_file)
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    }

    /// Move a single report into the approved partition.
    pub fn approve(&self, report: &Path) -> Result<PathBuf, StoreError> {
        let name = report
            .file_name()
            .ok_or_else(|| StoreError::IoError(format!("not a report file: {report:?}")))?;
        let target_dir = self.dir(Partition::Approved);
        std::fs::create_dir_all(&target_dir).map_err(|e| StoreError::IoError(e.to_string()))?;

        let target = target_dir.join(name);
        std::fs::rename(report, &target).map_err(|e| StoreError::IoError(e.to_string()))?;
        Ok(target)
    }

    /// Move every unapproved report into the approved partition.
    ///
    /// A report that cannot be moved is logged and left where it is; it will
    /// be picked up again on the next approval. Returns the number of
    /// reports moved.
    pub fn approve_all(&self) -> usize {
        let mut moved = 0;
        for report in self.reports(Partition::Unapproved) {
            match self.approve(&report) {
                Ok(_) => moved += 1,
                Err(e) => warn!("Could not approve report {report:?}: {e}"),
            }
        }
        moved
    }

    /// Delete a stored report.
    pub fn delete(&self, report: &Path) -> Result<(), StoreError> {
        std::fs::remove_file(report).map_err(|e| StoreError::IoError(e.to_string()))
    }
}

/// Delete a report file, logging on failure.
///
/// Used where a failed deletion must not change the outcome of the
/// surrounding operation.
pub fn delete_report(report: &Path) {
    if let Err(e) = std::fs::remove_file(report) {
        warn!("Could not delete report {report:?}: {e}");
    }
}
