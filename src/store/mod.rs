//! Durable report storage.
//!
//! This module owns where report files live and how they are named:
//! - partitioned layout with `unapproved` and `approved` directories
//! - filename conventions carrying the silent marker and report suffix
//! - migration of the legacy flat layout into the partitions

pub mod filename;
pub mod locator;
pub mod migration;

// Re-export commonly used types
pub use locator::{delete_report, Partition, ReportLocator, StoreError};
pub use migration::{migrate_legacy_reports, MigrationSummary};
