//! Retry decision for partially failed deliveries.

use crate::sender::{ReportSender, SenderError};

/// Record of one sender failing during a delivery attempt.
///
/// These records live only for the duration of the attempt; nothing about
/// failed senders is persisted, so a retried report goes to every sender
/// again.
#[derive(Debug)]
pub struct FailedSender {
    /// Name of the sender that failed
    pub name: String,
    /// Why it failed
    pub error: SenderError,
}

/// Decides whether a report whose delivery partially failed should be kept
/// for another attempt.
pub trait RetryPolicy: Send + Sync {
    /// `senders` is every sender that was attempted, `failed` the subset
    /// that raised an error. Returns true to keep the report for a retry.
    fn should_retry_send(&self, senders: &[Box<dyn ReportSender>], failed: &[FailedSender])
        -> bool;
}

/// Retry only when no sender succeeded.
///
/// One successful sender is enough to consider the report delivered;
/// the remaining failures are logged and accepted.
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry_send(
        &self,
        senders: &[Box<dyn ReportSender>],
        failed: &[FailedSender],
    ) -> bool {
        senders.len() == failed.len()
    }
}
