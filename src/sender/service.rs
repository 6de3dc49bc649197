//! Send-pass driver and background worker.
//!
//! A send pass walks the approved partition and distributes each report,
//! bounded by the per-pass cap. Passes run one at a time: triggers are
//! queued to a single worker thread, and the pass itself holds a lock so
//! even a direct synchronous run cannot overlap a queued one.

use crate::sender::distributor::{DistributeOutcome, ReportDistributor};
use crate::sender::retry::RetryPolicy;
use crate::sender::ReportSender;
use crate::stats::SharedDeliveryStats;
use crate::store::{filename, Partition, ReportLocator};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

/// Counters for one send pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Reports handed to the distributor
    pub processed: usize,
    /// Reports delivered by every sender
    pub delivered: usize,
    /// Reports delivered despite some sender failures
    pub accepted: usize,
    /// Reports dropped by the dev-mode guard
    pub skipped: usize,
    /// Reports discarded because they could not be loaded
    pub corrupt: usize,
    /// Reports kept in the store for another pass
    pub retained: usize,
}

impl PassSummary {
    /// Reports that left the store during this pass.
    pub fn deleted(&self) -> usize {
        self.delivered + self.accepted + self.skipped + self.corrupt
    }
}

impl std::fmt::Display for PassSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} processed: {} delivered, {} accepted with failures, {} skipped, {} discarded corrupt, {} kept for retry",
            self.processed, self.delivered, self.accepted, self.skipped, self.corrupt,
            self.retained
        )
    }
}

/// Everything a send pass needs, shared between the worker and direct callers.
pub struct SenderCore {
    locator: ReportLocator,
    senders: Vec<Box<dyn ReportSender>>,
    policy: Box<dyn RetryPolicy>,
    dev_build: bool,
    send_in_dev_mode: bool,
    max_reports_per_pass: usize,
    stats: Option<SharedDeliveryStats>,
    pass_lock: Mutex<()>,
}

impl SenderCore {
    /// Create a pass core over a store, senders and retry policy.
    pub fn new(
        locator: ReportLocator,
        senders: Vec<Box<dyn ReportSender>>,
        policy: Box<dyn RetryPolicy>,
        dev_build: bool,
        send_in_dev_mode: bool,
        max_reports_per_pass: usize,
    ) -> Self {
        Self {
            locator,
            senders,
            policy,
            dev_build,
            send_in_dev_mode,
            max_reports_per_pass,
            stats: None,
            pass_lock: Mutex::new(()),
        }
    }

    /// Record pass outcomes into the given delivery stats.
    pub fn with_stats(mut self, stats: SharedDeliveryStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// The report store this core drives.
    pub fn locator(&self) -> &ReportLocator {
        &self.locator
    }

    /// Number of senders a pass will dispatch to.
    pub fn sender_count(&self) -> usize {
        self.senders.len()
    }

    /// Run one send pass.
    ///
    /// With `approve_first`, every unapproved report is moved to the
    /// approved partition before the scan. With `only_silent`, reports
    /// without the silent filename marker are left untouched and do not
    /// count against the per-pass cap. A report that fails to distribute
    /// never aborts the pass; it is counted and the scan moves on.
    pub fn run_send_pass(&self, only_silent: bool, approve_first: bool) -> PassSummary {
        let _guard = self
            .pass_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        debug!("About to start sending reports (only_silent: {only_silent}, approve_first: {approve_first})");

        if approve_first {
            let moved = self.locator.approve_all();
            if moved > 0 {
                debug!("Approved {moved} reports");
            }
        }

        let reports = self.locator.reports(Partition::Approved);
        let distributor = ReportDistributor::new(
            &self.senders,
            self.policy.as_ref(),
            self.dev_build,
            self.send_in_dev_mode,
        );

        let mut summary = PassSummary::default();
        for report in reports {
            let name = report
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if only_silent && !filename::is_silent(name) {
                continue;
            }
            if summary.processed >= self.max_reports_per_pass {
                break;
            }

            match distributor.distribute(&report) {
                Ok(DistributeOutcome::Delivered) => summary.delivered += 1,
                Ok(DistributeOutcome::AcceptedWithFailures) => summary.accepted += 1,
                Ok(DistributeOutcome::SkippedDevMode) => summary.skipped += 1,
                Ok(DistributeOutcome::DiscardedCorrupt) => summary.corrupt += 1,
                Err(_) => summary.retained += 1,
            }
            summary.processed += 1;
        }

        if summary.processed > 0 {
            info!("Send pass finished, {summary}");
        }
        if let Some(stats) = &self.stats {
            stats.record_pass(&summary);
        }
        summary
    }
}

enum Command {
    Pass {
        only_silent: bool,
        approve_first: bool,
        done: Option<Sender<PassSummary>>,
    },
    Shutdown,
}

/// Background worker executing send passes one at a time.
///
/// Requests are fire-and-forget; a crashing process can still enqueue a
/// final pass and wait for it with [`SenderService::run_pass_blocking`].
pub struct SenderService {
    core: Arc<SenderCore>,
    tx: Sender<Command>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SenderService {
    /// Spawn the worker thread.
    pub fn start(core: Arc<SenderCore>) -> Self {
        let (tx, rx) = unbounded();
        let worker_core = core.clone();
        let handle = thread::spawn(move || worker_loop(worker_core, rx));

        Self {
            core,
            tx,
            handle: Some(handle),
        }
    }

    /// Queue a send pass without waiting for it.
    pub fn request_pass(&self, only_silent: bool, approve_first: bool) {
        let request = Command::Pass {
            only_silent,
            approve_first,
            done: None,
        };
        if self.tx.send(request).is_err() {
            warn!("Sender worker is gone, running send pass inline");
            self.core.run_send_pass(only_silent, approve_first);
        }
    }

    /// Queue a send pass and wait for its summary.
    ///
    /// Earlier queued passes run first. Falls back to running the pass on
    /// the calling thread if the worker is gone.
    pub fn run_pass_blocking(&self, only_silent: bool, approve_first: bool) -> PassSummary {
        let (done_tx, done_rx) = bounded(1);
        let request = Command::Pass {
            only_silent,
            approve_first,
            done: Some(done_tx),
        };
        if self.tx.send(request).is_ok() {
            if let Ok(summary) = done_rx.recv() {
                return summary;
            }
        }
        self.core.run_send_pass(only_silent, approve_first)
    }

    /// Stop the worker after it has drained all queued passes.
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(core: Arc<SenderCore>, rx: Receiver<Command>) {
    while let Ok(command) = rx.recv() {
        match command {
            Command::Pass {
                only_silent,
                approve_first,
                done,
            } => {
                let summary = core.run_send_pass(only_silent, approve_first);
                if let Some(done) = done {
                    let _ = done.send(summary);
                }
            }
            Command::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{persister, CrashReportData, ReportField};
    use crate::sender::retry::DefaultRetryPolicy;
    use crate::sender::SenderError;
    use std::path::{Path, PathBuf};

    struct OkSender;

    impl ReportSender for OkSender {
        fn name(&self) -> &str {
            "ok"
        }

        fn send(&self, _report: &CrashReportData) -> Result<(), SenderError> {
            Ok(())
        }
    }

    /// Fails any report whose message is "poison".
    struct PickySender;

    impl ReportSender for PickySender {
        fn name(&self) -> &str {
            "picky"
        }

        fn send(&self, report: &CrashReportData) -> Result<(), SenderError> {
            if report.get_text(ReportField::PanicMessage) == Some("poison") {
                Err(SenderError::Server {
                    status: 500,
                    message: "rejected".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn write_report(dir: &Path, name: &str, message: &str) -> PathBuf {
        let mut data = CrashReportData::new();
        data.put(ReportField::ReportId, name);
        data.put(ReportField::PanicMessage, message);
        let path = dir.join(name);
        persister::store(&data, &path).unwrap();
        path
    }

    fn core_with(dir: &Path, senders: Vec<Box<dyn ReportSender>>, max: usize) -> SenderCore {
        let locator = ReportLocator::new(dir);
        locator.ensure_partitions().unwrap();
        SenderCore::new(
            locator,
            senders,
            Box::new(DefaultRetryPolicy),
            false,
            false,
            max,
        )
    }

    #[test]
    fn test_pass_honors_per_pass_cap() {
        let dir = tempfile::tempdir().unwrap();
        let core = core_with(dir.path(), vec![Box::new(OkSender)], 5);
        let approved = core.locator().dir(Partition::Approved);
        for i in 0..7 {
            write_report(&approved, &format!("10{i}.stacktrace"), "boom");
        }

        let summary = core.run_send_pass(false, false);
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.delivered, 5);
        assert_eq!(core.locator().reports(Partition::Approved).len(), 2);
    }

    #[test]
    fn test_only_silent_skips_interactive_reports() {
        let dir = tempfile::tempdir().unwrap();
        let core = core_with(dir.path(), vec![Box::new(OkSender)], 5);
        let approved = core.locator().dir(Partition::Approved);
        write_report(&approved, "100-silent.stacktrace", "boom");
        write_report(&approved, "200.stacktrace", "boom");

        let summary = core.run_send_pass(true, false);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.delivered, 1);

        let remaining = core.locator().reports(Partition::Approved);
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].ends_with("200.stacktrace"));
    }

    #[test]
    fn test_skipped_reports_do_not_consume_the_cap() {
        let dir = tempfile::tempdir().unwrap();
        let core = core_with(dir.path(), vec![Box::new(OkSender)], 2);
        let approved = core.locator().dir(Partition::Approved);
        write_report(&approved, "100.stacktrace", "boom");
        write_report(&approved, "200.stacktrace", "boom");
        write_report(&approved, "300-silent.stacktrace", "boom");
        write_report(&approved, "400-silent.stacktrace", "boom");

        let summary = core.run_send_pass(true, false);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.delivered, 2);
        assert_eq!(core.locator().reports(Partition::Approved).len(), 2);
    }

    #[test]
    fn test_approve_first_moves_pending_reports() {
        let dir = tempfile::tempdir().unwrap();
        let core = core_with(dir.path(), vec![Box::new(OkSender)], 5);
        let unapproved = core.locator().dir(Partition::Unapproved);
        write_report(&unapproved, "100.stacktrace", "boom");
        write_report(&unapproved, "200.stacktrace", "boom");

        let summary = core.run_send_pass(false, true);
        assert_eq!(summary.delivered, 2);
        assert!(core.locator().reports(Partition::Unapproved).is_empty());
        assert!(core.locator().reports(Partition::Approved).is_empty());
    }

    #[test]
    fn test_unapproved_reports_wait_without_approve_first() {
        let dir = tempfile::tempdir().unwrap();
        let core = core_with(dir.path(), vec![Box::new(OkSender)], 5);
        let unapproved = core.locator().dir(Partition::Unapproved);
        write_report(&unapproved, "100.stacktrace", "boom");

        let summary = core.run_send_pass(false, false);
        assert_eq!(summary.processed, 0);
        assert_eq!(core.locator().reports(Partition::Unapproved).len(), 1);
    }

    #[test]
    fn test_failing_report_does_not_abort_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let core = core_with(dir.path(), vec![Box::new(PickySender)], 5);
        let approved = core.locator().dir(Partition::Approved);
        write_report(&approved, "100.stacktrace", "poison");
        write_report(&approved, "200.stacktrace", "boom");

        let summary = core.run_send_pass(false, false);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.retained, 1);
        assert_eq!(summary.delivered, 1);

        let remaining = core.locator().reports(Partition::Approved);
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].ends_with("100.stacktrace"));
    }

    /// Panics on any report whose message is "bomb".
    struct VolatileSender;

    impl ReportSender for VolatileSender {
        fn name(&self) -> &str {
            "volatile"
        }

        fn send(&self, report: &CrashReportData) -> Result<(), SenderError> {
            if report.get_text(ReportField::PanicMessage) == Some("bomb") {
                panic!("sender blew up");
            }
            Ok(())
        }
    }

    #[test]
    fn test_panicking_sender_does_not_abort_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let core = core_with(dir.path(), vec![Box::new(VolatileSender)], 5);
        let approved = core.locator().dir(Partition::Approved);
        write_report(&approved, "100.stacktrace", "bomb");
        write_report(&approved, "200.stacktrace", "fine");

        let summary = core.run_send_pass(false, false);

        // The panic is contained to its report; the second report was
        // still visited and delivered.
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.retained, 1);
        assert_eq!(summary.delivered, 1);

        let remaining = core.locator().reports(Partition::Approved);
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].ends_with("100.stacktrace"));
    }

    #[test]
    fn test_worker_survives_a_panicking_sender() {
        let dir = tempfile::tempdir().unwrap();
        let core = Arc::new(core_with(dir.path(), vec![Box::new(VolatileSender)], 5));
        let approved = core.locator().dir(Partition::Approved);
        write_report(&approved, "100.stacktrace", "bomb");

        let mut service = SenderService::start(core.clone());
        let first = service.run_pass_blocking(false, false);
        assert_eq!(first.retained, 1);
        assert!(!service.handle.as_ref().unwrap().is_finished());

        // The worker is still alive to serve the retry pass.
        write_report(&approved, "100.stacktrace", "fine");
        let second = service.run_pass_blocking(false, false);
        assert_eq!(second.delivered, 1);
        assert!(core.locator().reports(Partition::Approved).is_empty());
        service.shutdown();
    }

    #[test]
    fn test_retained_report_is_retried_on_next_pass() {
        let dir = tempfile::tempdir().unwrap();
        let core = core_with(dir.path(), vec![Box::new(PickySender)], 5);
        let approved = core.locator().dir(Partition::Approved);
        let report = write_report(&approved, "100.stacktrace", "poison");

        assert_eq!(core.run_send_pass(false, false).retained, 1);
        assert!(report.exists());

        // The backend recovers: rewrite the report with an acceptable message.
        write_report(&approved, "100.stacktrace", "boom");
        let second = core.run_send_pass(false, false);
        assert_eq!(second.delivered, 1);
        assert!(!report.exists());
    }

    #[test]
    fn test_worker_runs_queued_passes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let core = Arc::new(core_with(dir.path(), vec![Box::new(OkSender)], 5));
        let approved = core.locator().dir(Partition::Approved);
        write_report(&approved, "100.stacktrace", "boom");

        let mut service = SenderService::start(core.clone());
        service.request_pass(false, false);
        let summary = service.run_pass_blocking(false, false);

        // The blocking pass ran after the queued one, which already
        // delivered the only report.
        assert_eq!(summary.processed, 0);
        assert!(core.locator().reports(Partition::Approved).is_empty());
        service.shutdown();
    }

    #[test]
    fn test_shutdown_drains_queued_passes() {
        let dir = tempfile::tempdir().unwrap();
        let core = Arc::new(core_with(dir.path(), vec![Box::new(OkSender)], 5));
        let approved = core.locator().dir(Partition::Approved);
        write_report(&approved, "100.stacktrace", "boom");

        let mut service = SenderService::start(core.clone());
        service.request_pass(false, false);
        service.shutdown();

        assert!(core.locator().reports(Partition::Approved).is_empty());
    }

    #[test]
    fn test_pass_summary_display() {
        let summary = PassSummary {
            processed: 3,
            delivered: 1,
            accepted: 1,
            skipped: 0,
            corrupt: 0,
            retained: 1,
        };
        let text = summary.to_string();
        assert!(text.contains("3 processed"));
        assert!(text.contains("1 delivered"));
        assert!(text.contains("1 kept for retry"));
        assert_eq!(summary.deleted(), 2);
    }
}
