//! Report delivery.
//!
//! A report sender is one delivery backend. The distributor hands every
//! pending report to every configured sender and decides from the combined
//! outcome whether the report is done or must be kept for another attempt.

pub mod distributor;
pub mod email;
pub mod http;
pub mod retry;
pub mod service;

use crate::config::Config;
use crate::report::CrashReportData;
use tracing::warn;

// Re-export commonly used types
pub use distributor::{DistributeError, DistributeOutcome, ReportDistributor};
pub use email::EmailSender;
pub use http::{BlockingHttpSender, HttpSender};
pub use retry::{DefaultRetryPolicy, FailedSender, RetryPolicy};
pub use service::{PassSummary, SenderCore, SenderService};

/// Report sender error types.
#[derive(Debug)]
pub enum SenderError {
    /// Configuration error
    Config(String),
    /// Network/transport error
    Network(String),
    /// Server rejected the report
    Server { status: u16, message: String },
    /// Report serialization error
    Serialization(String),
    /// The sender panicked while delivering; carries the panic message
    Panicked(String),
}

impl std::fmt::Display for SenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SenderError::Config(msg) => write!(f, "Sender config error: {msg}"),
            SenderError::Network(msg) => write!(f, "Sender network error: {msg}"),
            SenderError::Server { status, message } => {
                write!(f, "Sender server error ({status}): {message}")
            }
            SenderError::Serialization(msg) => write!(f, "Sender serialization error: {msg}"),
            SenderError::Panicked(msg) => write!(f, "Sender panicked: {msg}"),
        }
    }
}

impl std::error::Error for SenderError {}

/// One delivery backend for crash reports.
///
/// Senders block until the report is handed off and must not touch the
/// report file; storage decisions stay with the distributor. A sender may
/// be invoked again for a report it already delivered, so delivery should
/// be safe to repeat.
pub trait ReportSender: Send + Sync {
    /// Short name identifying this sender in logs and failure records.
    fn name(&self) -> &str;

    /// Deliver one report.
    fn send(&self, report: &CrashReportData) -> Result<(), SenderError>;
}

/// A sender that delivers nothing.
///
/// Stands in when a deployment deliberately runs capture-only; it warns on
/// every report so the gap is visible in logs.
pub struct NullSender;

impl ReportSender for NullSender {
    fn name(&self) -> &str {
        "null"
    }

    fn send(&self, _report: &CrashReportData) -> Result<(), SenderError> {
        warn!("Report will NOT be sent - no delivery backend is configured");
        Ok(())
    }
}

/// Build the senders declared in the configuration.
///
/// Returns an empty list when the configuration declares no backend;
/// callers decide whether that is an error.
pub fn senders_from_config(config: &Config) -> Result<Vec<Box<dyn ReportSender>>, SenderError> {
    let mut senders: Vec<Box<dyn ReportSender>> = Vec::new();

    if let Some(http) = &config.http {
        senders.push(Box::new(BlockingHttpSender::new(http.clone())?));
    }
    if let Some(email) = &config.email {
        senders.push(Box::new(EmailSender::new(email.clone())?));
    }

    Ok(senders)
}
