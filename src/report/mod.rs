//! Report data model and file persistence.

pub mod persister;
pub mod types;

// Re-export commonly used types
pub use persister::PersistError;
pub use types::{CrashReportData, ReportField, ReportValue};
