//! End-to-end report lifecycle tests through the public API:
//! capture, approval, distribution, retry and legacy migration.

use faultline::{
    Agent, Config, CrashReportData, Partition, ReportBuilder, ReportField, ReportSender,
    SenderError, SenderFactory,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records every delivered panic message; fails while `failing` is set.
struct RecordingSender {
    messages: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl ReportSender for RecordingSender {
    fn name(&self) -> &str {
        "recording"
    }

    fn send(&self, report: &CrashReportData) -> Result<(), SenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SenderError::Network("connection refused".to_string()));
        }
        let message = report
            .get_text(ReportField::PanicMessage)
            .unwrap_or_default()
            .to_string();
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Backend {
    messages: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl Backend {
    fn factory(&self) -> SenderFactory {
        let backend = self.clone();
        Box::new(move |_config| {
            Ok(Box::new(RecordingSender {
                messages: backend.messages.clone(),
                calls: backend.calls.clone(),
                failing: backend.failing.clone(),
            }))
        })
    }

    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn test_config(dir: &Path) -> Config {
    Config {
        app_name: "lifecycle-test".to_string(),
        data_path: dir.to_path_buf(),
        send_in_dev_mode: true,
        ..Default::default()
    }
}

#[test]
fn test_report_is_captured_and_delivered() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Backend::default();
    let agent = Agent::builder(test_config(dir.path()))
        .sender_factory(backend.factory())
        .without_panic_hook()
        .build()
        .unwrap();

    let path = agent
        .handle_report(ReportBuilder::new("disk full").capture_backtrace())
        .unwrap();
    let summary = agent.flush();

    assert!(!path.exists());
    assert_eq!(summary.retained, 0);
    assert_eq!(backend.messages(), vec!["disk full".to_string()]);
    assert_eq!(agent.stats().snapshot().reports_delivered, 1);
    agent.shutdown();
}

#[test]
fn test_failed_delivery_is_retried_with_all_senders() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Backend::default();
    backend.failing.store(true, Ordering::SeqCst);
    let agent = Agent::builder(test_config(dir.path()))
        .sender_factory(backend.factory())
        .without_panic_hook()
        .without_startup_pass()
        .build()
        .unwrap();

    let path = agent.handle_report(ReportBuilder::new("boom")).unwrap();
    agent.flush();

    // Total failure keeps the file for another pass.
    assert!(path.exists());
    assert!(backend.calls() >= 1);
    let calls_after_failure = backend.calls();

    // The backend recovers; the next pass re-attempts the sender.
    backend.failing.store(false, Ordering::SeqCst);
    let summary = agent.flush();

    assert!(!path.exists());
    assert_eq!(summary.retained, 0);
    assert!(backend.calls() > calls_after_failure);
    assert_eq!(backend.messages(), vec!["boom".to_string()]);
    agent.shutdown();
}

#[test]
fn test_one_successful_sender_is_sufficient() {
    let dir = tempfile::tempdir().unwrap();
    let good = Backend::default();
    let bad = Backend::default();
    bad.failing.store(true, Ordering::SeqCst);

    let agent = Agent::builder(test_config(dir.path()))
        .sender_factory(bad.factory())
        .sender_factory(good.factory())
        .without_panic_hook()
        .without_startup_pass()
        .build()
        .unwrap();

    let path = agent.handle_report(ReportBuilder::new("boom")).unwrap();
    let summary = agent.flush();

    // Partial failure is accepted under the default policy.
    assert!(!path.exists());
    assert_eq!(summary.retained, 0);
    assert_eq!(good.messages(), vec!["boom".to_string()]);
    agent.shutdown();
}

#[test]
fn test_approval_gate_and_user_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Backend::default();
    let mut config = test_config(dir.path());
    config.require_approval = true;
    config.silent_by_default = false;

    let agent = Agent::builder(config)
        .sender_factory(backend.factory())
        .without_panic_hook()
        .without_startup_pass()
        .build()
        .unwrap();

    let path = agent.handle_report(ReportBuilder::new("boom")).unwrap();
    agent.flush();
    assert!(path.exists(), "unapproved report must not be sent");
    assert_eq!(backend.calls(), 0);

    agent
        .attach_user_feedback(&path, Some("crashed while saving"), None)
        .unwrap();
    agent.approve_all();
    agent.flush();

    assert!(!path.exists());
    assert_eq!(backend.messages(), vec!["boom".to_string()]);
    agent.shutdown();
}

#[test]
fn test_legacy_reports_are_migrated_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("123.stacktrace"), "{}").unwrap();
    std::fs::write(dir.path().join("456-approved.stacktrace"), "{}").unwrap();

    let backend = Backend::default();
    let agent = Agent::builder(test_config(dir.path()))
        .sender_factory(backend.factory())
        .without_panic_hook()
        .without_startup_pass()
        .build()
        .unwrap();

    let unapproved = agent.locator().reports(Partition::Unapproved);
    let approved = agent.locator().reports(Partition::Approved);
    assert_eq!(unapproved.len(), 1);
    assert!(unapproved[0].ends_with("123.stacktrace"));
    assert_eq!(approved.len(), 1);
    assert!(approved[0].ends_with("456-approved.stacktrace"));
    agent.shutdown();
}

#[test]
fn test_panic_hook_captures_and_delivers() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Backend::default();
    let agent = Agent::builder(test_config(dir.path()))
        .sender_factory(backend.factory())
        .without_startup_pass()
        .build()
        .unwrap();

    let handle = std::thread::spawn(|| panic!("worker thread crashed"));
    assert!(handle.join().is_err());

    assert_eq!(backend.messages(), vec!["worker thread crashed".to_string()]);
    assert!(agent.locator().reports(Partition::Approved).is_empty());
    assert_eq!(agent.stats().snapshot().reports_captured, 1);
    agent.shutdown();
}
