//! Report assembly.
//!
//! `ReportBuilder` collects what is known about one crash and produces the
//! full `CrashReportData`, merging in the runtime snapshot, configuration
//! facts and the application log tail.

use crate::capture::runtime::RuntimeInfo;
use crate::config::Config;
use crate::report::{CrashReportData, ReportField};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

/// Builds one crash report.
pub struct ReportBuilder {
    message: String,
    location: Option<String>,
    backtrace: Option<String>,
    thread_name: Option<String>,
    silent: Option<bool>,
    custom: BTreeMap<String, serde_json::Value>,
}

impl ReportBuilder {
    /// Start a report for the given panic or error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            backtrace: None,
            thread_name: None,
            silent: None,
            custom: BTreeMap::new(),
        }
    }

    /// Source location of the failure, `file:line:column`.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Attach an already-captured backtrace.
    pub fn backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }

    /// Capture a backtrace now, regardless of `RUST_BACKTRACE`.
    pub fn capture_backtrace(mut self) -> Self {
        self.backtrace = Some(std::backtrace::Backtrace::force_capture().to_string());
        self
    }

    /// Name of the thread the failure occurred on.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    /// Capture the current thread's name.
    pub fn current_thread(mut self) -> Self {
        self.thread_name = std::thread::current().name().map(String::from);
        self
    }

    /// Override the configured silent flag for this report.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    /// Attach an application-provided key/value pair.
    pub fn custom(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// Whether this report will carry the silent marker.
    pub fn is_silent(&self, config: &Config) -> bool {
        self.silent.unwrap_or(config.silent_by_default)
    }

    /// Produce the report data.
    pub fn build(self, config: &Config) -> CrashReportData {
        let runtime = RuntimeInfo::get();
        let silent = self.silent.unwrap_or(config.silent_by_default);

        let mut data = CrashReportData::new();
        data.put(ReportField::ReportId, Uuid::new_v4().to_string());
        data.put(ReportField::AppName, config.app_name.as_str());
        if !config.app_version.is_empty() {
            data.put(ReportField::AppVersion, config.app_version.as_str());
        }
        data.put(ReportField::AgentVersion, env!("CARGO_PKG_VERSION"));
        data.put(ReportField::InstanceId, runtime.instance_id.as_str());
        data.put(ReportField::Hostname, runtime.hostname.as_str());
        data.put(ReportField::OsName, runtime.os.as_str());
        data.put(ReportField::Arch, runtime.arch.as_str());
        data.put(ReportField::Pid, runtime.pid as i64);
        data.put(
            ReportField::AppStartTime,
            runtime.start_time.to_rfc3339(),
        );
        data.put(ReportField::CrashTime, Utc::now().to_rfc3339());
        data.put(ReportField::IsSilent, silent);
        data.put(ReportField::PanicMessage, self.message);

        if let Some(location) = self.location {
            data.put(ReportField::PanicLocation, location);
        }
        if let Some(backtrace) = self.backtrace {
            data.put(ReportField::Backtrace, backtrace);
        }
        if let Some(thread_name) = self.thread_name {
            data.put(ReportField::ThreadName, thread_name);
        }
        if !self.custom.is_empty() {
            data.put(
                ReportField::CustomData,
                serde_json::Value::Object(self.custom.into_iter().collect()),
            );
        }

        if let Some(log_file) = &config.application_log_file {
            match tail_file(log_file, config.application_log_lines) {
                Ok(tail) => data.put(ReportField::ApplicationLog, tail),
                Err(e) => warn!("Could not read application log {log_file:?}: {e}"),
            }
        }

        data
    }
}

/// Bytes budgeted per requested log line when tailing a file.
const TAIL_BYTES_PER_LINE: u64 = 512;

/// Last `lines` lines of a text file.
///
/// Reads a bounded chunk from the end of the file; the log may be
/// arbitrarily large and this runs in a crashing process.
fn tail_file(path: &Path, lines: usize) -> Result<String, std::io::Error> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    let budget = (lines as u64).saturating_mul(TAIL_BYTES_PER_LINE);
    let start = len.saturating_sub(budget);
    file.seek(SeekFrom::Start(start))?;

    let mut chunk = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut chunk)?;
    let text = String::from_utf8_lossy(&chunk);

    let mut all: Vec<&str> = text.lines().collect();
    // A chunk that starts mid-file usually begins mid-line; drop the
    // fragment unless that would cut into the requested line count.
    if start > 0 && all.len() > lines {
        all.remove(0);
    }
    let skip = all.len().saturating_sub(lines);
    Ok(all[skip..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            app_name: "demo".to_string(),
            app_version: "1.2.3".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_fills_runtime_fields() {
        let data = ReportBuilder::new("boom")
            .location("src/main.rs:10:5")
            .build(&test_config());

        assert_eq!(data.get_text(ReportField::AppName), Some("demo"));
        assert_eq!(data.get_text(ReportField::AppVersion), Some("1.2.3"));
        assert_eq!(data.get_text(ReportField::PanicMessage), Some("boom"));
        assert_eq!(
            data.get_text(ReportField::PanicLocation),
            Some("src/main.rs:10:5")
        );
        assert!(data.contains(ReportField::Hostname));
        assert!(data.contains(ReportField::Pid));
        assert!(data.contains(ReportField::CrashTime));
    }

    #[test]
    fn test_silent_defaults_from_config() {
        let mut config = test_config();
        config.silent_by_default = true;
        assert!(ReportBuilder::new("boom").build(&config).is_silent());

        config.silent_by_default = false;
        assert!(!ReportBuilder::new("boom").build(&config).is_silent());
        assert!(ReportBuilder::new("boom").silent(true).build(&config).is_silent());
    }

    #[test]
    fn test_custom_pairs_are_nested() {
        let data = ReportBuilder::new("boom")
            .custom("build", "nightly")
            .custom("attempts", 3)
            .build(&test_config());

        match data.get(ReportField::CustomData) {
            Some(crate::report::ReportValue::Structured(v)) => {
                assert_eq!(v["build"], "nightly");
                assert_eq!(v["attempts"], 3);
            }
            other => panic!("expected structured custom data, got {other:?}"),
        }
    }

    #[test]
    fn test_log_tail_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        let content: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
        std::fs::write(&log, content.join("\n")).unwrap();

        let mut config = test_config();
        config.application_log_file = Some(log);
        config.application_log_lines = 5;

        let data = ReportBuilder::new("boom").build(&config);
        let tail = data.get_text(ReportField::ApplicationLog).unwrap();
        assert_eq!(tail.lines().count(), 5);
        assert!(tail.starts_with("line 15"));
        assert!(tail.ends_with("line 19"));
    }

    #[test]
    fn test_log_tail_of_oversized_file_stays_exact() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        // Well past the tail read budget for two lines.
        let content: Vec<String> = (0..300).map(|i| format!("this is log line {i:03}")).collect();
        std::fs::write(&log, content.join("\n")).unwrap();

        let mut config = test_config();
        config.application_log_file = Some(log);
        config.application_log_lines = 2;

        let data = ReportBuilder::new("boom").build(&config);
        let tail = data.get_text(ReportField::ApplicationLog).unwrap();
        // Whole lines only, no leading fragment from the partial read.
        assert_eq!(tail, "this is log line 298\nthis is log line 299");
    }

    #[test]
    fn test_missing_log_file_is_tolerated() {
        let mut config = test_config();
        config.application_log_file = Some("/nonexistent/app.log".into());

        let data = ReportBuilder::new("boom").build(&config);
        assert!(!data.contains(ReportField::ApplicationLog));
    }

    #[test]
    fn test_captured_backtrace_is_attached() {
        let data = ReportBuilder::new("boom")
            .capture_backtrace()
            .build(&test_config());
        assert!(data.contains(ReportField::Backtrace));
    }
}
