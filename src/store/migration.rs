//! Migration of reports from the legacy flat layout.
//!
//! Earlier versions stored every report directly in the data directory and
//! encoded approval in the filename. This moves those files into the
//! partition directories. Running it again is harmless: once moved, the
//! data root no longer contains report files, so there is nothing to do.

use crate::store::filename;
use crate::store::locator::{Partition, ReportLocator};
use tracing::{info, warn};

/// Outcome of a migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Reports moved into a partition
    pub migrated: usize,
    /// Reports that could not be moved and were left in place
    pub failed: usize,
}

/// Move legacy flat-layout reports into the partitioned store.
///
/// Only the top level of the data directory is scanned; files already in a
/// partition are never touched. A file that cannot be moved is logged and
/// left for the next run.
pub fn migrate_legacy_reports(locator: &ReportLocator) -> MigrationSummary {
    let mut summary = MigrationSummary::default();

    let legacy = collect_legacy_reports(locator);
    if legacy.is_empty() {
        return summary;
    }

    info!("Migrating {} reports to the partitioned layout", legacy.len());

    if let Err(e) = locator.ensure_partitions() {
        warn!("Could not create report partitions, skipping migration: {e}");
        summary.failed = legacy.len();
        return summary;
    }

    for (path, name) in legacy {
        let partition = if filename::is_approved(&name) {
            Partition::Approved
        } else {
            Partition::Unapproved
        };
        let target = locator.dir(partition).join(&name);
        match std::fs::rename(&path, &target) {
            Ok(()) => summary.migrated += 1,
            Err(e) => {
                warn!("Could not migrate report {path:?}: {e}");
                summary.failed += 1;
            }
        }
    }

    info!(
        "Migrated {} reports ({} left in place)",
        summary.migrated, summary.failed
    );
    summary
}

/// Report files sitting directly in the data root, with their names.
fn collect_legacy_reports(locator: &ReportLocator) -> Vec<(std::path::PathBuf, String)> {
    let entries = match std::fs::read_dir(locator.data_path()) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut reports: Vec<(std::path::PathBuf, String)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?.to_string();
            filename::is_report_file(&name).then_some((p, name))
        })
        .collect();
    reports.sort();
    reports
}
