//! Report file (de)serialization.
//!
//! Reports are stored as pretty-printed JSON, one file per report. A report
//! that cannot be read back is unrecoverable; callers discard such files.

use crate::report::types::{CrashReportData, ReportField};
use std::path::Path;

/// Errors raised while loading or storing a report file.
#[derive(Debug)]
pub enum PersistError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::IoError(e) => write!(f, "IO error: {e}"),
            PersistError::ParseError(e) => write!(f, "Parse error: {e}"),
            PersistError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for PersistError {}

/// Load a report from a file.
pub fn load(path: &Path) -> Result<CrashReportData, PersistError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| PersistError::IoError(e.to_string()))?;
    let data: CrashReportData =
        serde_json::from_str(&content).map_err(|e| PersistError::ParseError(e.to_string()))?;
    Ok(data)
}

/// Store a report to a file, creating parent directories as needed.
pub fn store(data: &CrashReportData, path: &Path) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PersistError::IoError(e.to_string()))?;
    }

    let content = serde_json::to_string_pretty(data)
        .map_err(|e| PersistError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| PersistError::IoError(e.to_string()))?;

    Ok(())
}

/// Attach a user comment and contact email to a stored report.
///
/// This is the only permitted modification of a stored report and must
/// happen before the first delivery attempt. Fields passed as `None` are
/// left untouched.
pub fn attach_user_feedback(
    path: &Path,
    comment: Option<&str>,
    email: Option<&str>,
) -> Result<(), PersistError> {
    let mut data = load(path)?;

    if let Some(comment) = comment {
        data.put(ReportField::UserComment, comment);
    }
    if let Some(email) = email {
        data.put(ReportField::UserEmail, email);
    }

    store(&data, path)
}
