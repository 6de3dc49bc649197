//! faultline - Crash report capture, storage and delivery for Rust applications.
//!
//! The agent hooks the process-wide panic handler, captures diagnostic
//! context into a structured report, persists the report to local storage,
//! and later delivers it to one or more configured backends (HTTP collector,
//! email) with a pluggable retry policy for partial failures.
//!
//! # Report lifecycle
//!
//! A report file moves through a fixed set of states; delivery only ever
//! deletes a file on a terminal outcome, so a crash mid-pass loses nothing:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          faultline                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐    ┌────────────┐    ┌──────────┐              │
//! │  │  Panic   │───▶│ unapproved │───▶│ approved │              │
//! │  │   Hook   │    │ partition  │    │partition │              │
//! │  └──────────┘    └────────────┘    └────┬─────┘              │
//! │        │          (approval is          │ send pass          │
//! │        ▼           a rename)            ▼                    │
//! │  ┌──────────┐                    ┌─────────────┐  retained   │
//! │  │ Runtime  │                    │ Distributor │──────┐      │
//! │  │ Snapshot │                    └──────┬──────┘      │      │
//! │  └──────────┘      all senders, then    │             │      │
//! │                    retry policy         ▼             │      │
//! │                            delete on accepted outcome ◀──────┘
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use faultline::{Agent, Config, HttpSenderConfig, ReportBuilder};
//!
//! let mut config = Config::load().unwrap_or_default();
//! config.app_name = "demo".to_string();
//! config.http = Some(HttpSenderConfig::new("https://crash.example.com/ingest"));
//!
//! let agent = Agent::builder(config).build().expect("faultline init failed");
//!
//! // Reports can also be filed without a panic:
//! agent
//!     .handle_report(ReportBuilder::new("background job failed").capture_backtrace())
//!     .expect("failed to store report");
//! ```

pub mod agent;
pub mod capture;
pub mod config;
pub mod report;
pub mod sender;
pub mod stats;
pub mod store;

// Re-export key types at crate root for convenience
pub use agent::{Agent, AgentBuilder, InitError, SenderFactory};
pub use capture::{install_panic_hook, ReportBuilder, RuntimeInfo};
pub use config::{Config, ConfigError};
pub use report::{CrashReportData, PersistError, ReportField, ReportValue};
pub use sender::email::EmailSenderConfig;
pub use sender::http::HttpSenderConfig;
pub use sender::{
    BlockingHttpSender, DefaultRetryPolicy, DistributeError, DistributeOutcome, EmailSender,
    FailedSender, HttpSender, NullSender, PassSummary, ReportDistributor, ReportSender,
    RetryPolicy, SenderError, SenderService,
};
pub use stats::{DeliverySnapshot, DeliveryStats, SharedDeliveryStats};
pub use store::{migrate_legacy_reports, MigrationSummary, Partition, ReportLocator, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
