//! Distributes stored reports to all senders.
//!
//! One call handles one report file end to end: load it, hand it to every
//! sender, ask the retry policy what a partial failure means, then delete
//! or keep the file. The file is only ever kept when the policy wants
//! another attempt; every other path ends with the file removed.

use crate::report::persister;
use crate::report::CrashReportData;
use crate::sender::retry::{FailedSender, RetryPolicy};
use crate::sender::{ReportSender, SenderError};
use crate::capture::hook::without_capture;
use crate::store::delete_report;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// How a report left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributeOutcome {
    /// Every sender delivered the report
    Delivered,
    /// Some senders failed but the policy accepted the delivery
    AcceptedWithFailures,
    /// Dev-mode guard skipped the senders entirely
    SkippedDevMode,
    /// The file could not be loaded and was discarded
    DiscardedCorrupt,
}

/// Delivery failed and the report was kept for another attempt.
#[derive(Debug)]
pub enum DistributeError {
    /// The retry policy marked the attempt incomplete; carries the first
    /// sender failure as the representative cause.
    Incomplete { sender: String, cause: SenderError },
}

impl std::fmt::Display for DistributeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributeError::Incomplete { sender, cause } => write!(
                f,
                "Delivery marked incomplete, the report will be sent again; first failure from {sender}: {cause}"
            ),
        }
    }
}

impl std::error::Error for DistributeError {}

/// Distributes reports to all senders.
pub struct ReportDistributor<'a> {
    senders: &'a [Box<dyn ReportSender>],
    policy: &'a dyn RetryPolicy,
    dev_build: bool,
    send_in_dev_mode: bool,
}

impl<'a> ReportDistributor<'a> {
    /// Create a distributor over the given senders and retry policy.
    ///
    /// `dev_build` states whether the running application is a development
    /// build; unless `send_in_dev_mode` is set, reports from dev builds are
    /// dropped without contacting any sender.
    pub fn new(
        senders: &'a [Box<dyn ReportSender>],
        policy: &'a dyn RetryPolicy,
        dev_build: bool,
        send_in_dev_mode: bool,
    ) -> Self {
        Self {
            senders,
            policy,
            dev_build,
            send_in_dev_mode,
        }
    }

    /// Send one report file via all senders.
    ///
    /// On success the file is deleted, whatever the exact outcome was. On
    /// error the file stays in place for a later pass.
    pub fn distribute(&self, report_file: &Path) -> Result<DistributeOutcome, DistributeError> {
        info!("Sending report {report_file:?}");

        let report = match persister::load(report_file) {
            Ok(report) => report,
            Err(e) => {
                error!("Failed to load report {report_file:?}: {e}");
                delete_report(report_file);
                return Ok(DistributeOutcome::DiscardedCorrupt);
            }
        };

        if self.dev_build && !self.send_in_dev_mode {
            debug!("Dev build, report {report_file:?} not sent");
            delete_report(report_file);
            return Ok(DistributeOutcome::SkippedDevMode);
        }

        match self.send_report(&report) {
            Ok(outcome) => {
                delete_report(report_file);
                Ok(outcome)
            }
            Err(e) => {
                error!("Failed to send report {report_file:?}: {e}");
                Err(e)
            }
        }
    }

    /// Dispatch a report to every sender, collecting failures.
    ///
    /// One successful sender is enough for the report to count as sent;
    /// whether total failure means retry is the policy's call.
    fn send_report(&self, report: &CrashReportData) -> Result<DistributeOutcome, DistributeError> {
        let mut failed: Vec<FailedSender> = Vec::new();

        for sender in self.senders {
            debug!("Sending report using {}", sender.name());
            // A panic in one sender is that sender's failure, nothing more;
            // the remaining senders and the rest of the pass still run.
            let result = catch_unwind(AssertUnwindSafe(|| {
                without_capture(|| sender.send(report))
            }))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload);
                error!("Sender {} panicked: {message}", sender.name());
                Err(SenderError::Panicked(message))
            });
            match result {
                Ok(()) => debug!("Sent report using {}", sender.name()),
                Err(e) => failed.push(FailedSender {
                    name: sender.name().to_string(),
                    error: e,
                }),
            }
        }

        if failed.is_empty() {
            debug!("Report was sent by all senders");
            Ok(DistributeOutcome::Delivered)
        } else if self.policy.should_retry_send(self.senders, &failed) {
            let FailedSender { name, error } = failed.swap_remove(0);
            Err(DistributeError::Incomplete {
                sender: name,
                cause: error,
            })
        } else {
            let names: Vec<&str> = failed.iter().map(|f| f.name.as_str()).collect();
            warn!(
                "Senders [{}] failed, but the delivery was accepted; the report will not be sent again",
                names.join(", ")
            );
            Ok(DistributeOutcome::AcceptedWithFailures)
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
