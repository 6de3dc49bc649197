//! Report file naming.
//!
//! Report identity lives in the filename: a millisecond timestamp plus a
//! short random component, an optional silent marker, and the report suffix.
//! Lexicographic order of generated names matches creation order, which the
//! store relies on for deterministic enumeration.

use chrono::Utc;
use uuid::Uuid;

/// Suffix shared by all report files.
pub const REPORT_FILE_SUFFIX: &str = ".stacktrace";

/// Marker embedded in the names of silently captured reports.
pub const SILENT_MARKER: &str = "-silent";

/// Marker the legacy flat layout used to record approval in the filename.
const LEGACY_APPROVED_MARKER: &str = "-approved";

/// Generate a filename for a new report.
pub fn new_report_name(silent: bool) -> String {
    format!(
        "{}-{}{}{}",
        Utc::now().timestamp_millis(),
        &Uuid::new_v4().to_string()[..8],
        if silent { SILENT_MARKER } else { "" },
        REPORT_FILE_SUFFIX
    )
}

/// Whether a filename belongs to a report file.
pub fn is_report_file(name: &str) -> bool {
    name.ends_with(REPORT_FILE_SUFFIX)
}

/// Whether a report was captured silently, judged by its filename.
pub fn is_silent(name: &str) -> bool {
    name.contains(SILENT_MARKER)
}

/// Whether a legacy report filename counts as approved.
///
/// Under the legacy flat layout approval was encoded in the filename rather
/// than in a directory. Silent reports never wait for approval, so they
/// count as approved too. Only the migrator consults this; new reports
/// record approval purely by partition.
pub fn is_approved(name: &str) -> bool {
    is_silent(name) || name.contains(LEGACY_APPROVED_MARKER)
}
