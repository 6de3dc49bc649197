//! Delivery statistics.
//!
//! Tracks how many reports were captured, delivered, discarded and retried
//! across the lifetime of an installation. Counters contain no report
//! content and can be shown to users as an account of what the agent did.

use crate::sender::PassSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Counters for capture and delivery activity.
#[derive(Debug)]
pub struct DeliveryStats {
    /// Number of reports written to the store
    reports_captured: AtomicU64,
    /// Number of reports delivered to at least one sender
    reports_delivered: AtomicU64,
    /// Number of reports discarded without delivery
    reports_discarded: AtomicU64,
    /// Number of times a report was kept for another attempt
    delivery_retries: AtomicU64,
    /// Number of send passes run
    passes_run: AtomicU64,
    /// When this process started tracking
    tracking_since: DateTime<Utc>,
    /// Path for persisting counters
    persist_path: Option<PathBuf>,
}

impl DeliveryStats {
    /// Create fresh stats.
    pub fn new() -> Self {
        Self {
            reports_captured: AtomicU64::new(0),
            reports_delivered: AtomicU64::new(0),
            reports_discarded: AtomicU64::new(0),
            delivery_retries: AtomicU64::new(0),
            passes_run: AtomicU64::new(0),
            tracking_since: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats persisted at the given path.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        // Pick up counters from previous runs
        if let Err(e) = stats.load() {
            warn!("Could not load previous delivery stats: {e}");
        }

        stats
    }

    /// Record a report written to the store.
    pub fn record_report_captured(&self) {
        self.reports_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a send pass.
    pub fn record_pass(&self, summary: &PassSummary) {
        self.passes_run.fetch_add(1, Ordering::Relaxed);
        self.reports_delivered
            .fetch_add((summary.delivered + summary.accepted) as u64, Ordering::Relaxed);
        self.reports_discarded
            .fetch_add((summary.skipped + summary.corrupt) as u64, Ordering::Relaxed);
        self.delivery_retries
            .fetch_add(summary.retained as u64, Ordering::Relaxed);
    }

    /// Get the current counters.
    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            reports_captured: self.reports_captured.load(Ordering::Relaxed),
            reports_delivered: self.reports_delivered.load(Ordering::Relaxed),
            reports_discarded: self.reports_discarded.load(Ordering::Relaxed),
            delivery_retries: self.delivery_retries.load(Ordering::Relaxed),
            passes_run: self.passes_run.load(Ordering::Relaxed),
            tracking_since: self.tracking_since,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            "Delivery Statistics:\n\
             - Reports captured: {}\n\
             - Reports delivered: {}\n\
             - Reports discarded: {}\n\
             - Delivery retries: {}\n\
             - Send passes run: {}",
            snapshot.reports_captured,
            snapshot.reports_delivered,
            snapshot.reports_discarded,
            snapshot.delivery_retries,
            snapshot.passes_run
        )
    }

    /// Save counters to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let snapshot = self.snapshot();
            let persisted = PersistedStats {
                reports_captured: snapshot.reports_captured,
                reports_delivered: snapshot.reports_delivered,
                reports_discarded: snapshot.reports_discarded,
                delivery_retries: snapshot.delivery_retries,
                passes_run: snapshot.passes_run,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load counters from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.reports_captured
                    .store(persisted.reports_captured, Ordering::Relaxed);
                self.reports_delivered
                    .store(persisted.reports_delivered, Ordering::Relaxed);
                self.reports_discarded
                    .store(persisted.reports_discarded, Ordering::Relaxed);
                self.delivery_retries
                    .store(persisted.delivery_retries, Ordering::Relaxed);
                self.passes_run.store(persisted.passes_run, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.reports_captured.store(0, Ordering::Relaxed);
        self.reports_delivered.store(0, Ordering::Relaxed);
        self.reports_discarded.store(0, Ordering::Relaxed);
        self.delivery_retries.store(0, Ordering::Relaxed);
        self.passes_run.store(0, Ordering::Relaxed);
    }
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the delivery counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySnapshot {
    pub reports_captured: u64,
    pub reports_delivered: u64,
    pub reports_discarded: u64,
    pub delivery_retries: u64,
    pub passes_run: u64,
    pub tracking_since: DateTime<Utc>,
}

/// Counter format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    reports_captured: u64,
    reports_delivered: u64,
    reports_discarded: u64,
    delivery_retries: u64,
    passes_run: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared delivery stats.
pub type SharedDeliveryStats = Arc<DeliveryStats>;

/// Create new shared delivery stats.
pub fn create_shared_stats() -> SharedDeliveryStats {
    Arc::new(DeliveryStats::new())
}

/// Create shared delivery stats persisted at the given path.
pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedDeliveryStats {
    Arc::new(DeliveryStats::with_persistence(path))
}
