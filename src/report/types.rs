//! Crash report data model.
//!
//! A report is an ordered map from a fixed set of fields to captured values.
//! Field order is the enum declaration order, so serialized reports always
//! list fields in the same sequence regardless of capture order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fields a crash report can carry.
///
/// Serialized names are the SCREAMING_SNAKE_CASE form of the variant, which
/// is also the key used in report files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportField {
    /// Unique identifier for this report
    ReportId,
    /// Name of the monitored application
    AppName,
    /// Version of the monitored application
    AppVersion,
    /// Version of this library
    AgentVersion,
    /// Stable identifier for this installation
    InstanceId,
    /// Hostname of the machine the crash occurred on
    Hostname,
    /// Operating system family
    OsName,
    /// CPU architecture
    Arch,
    /// Process id at crash time
    Pid,
    /// Name of the thread that crashed
    ThreadName,
    /// When the monitored application started
    AppStartTime,
    /// When the crash occurred
    CrashTime,
    /// Whether this report was captured without user interaction
    IsSilent,
    /// The panic or error message
    PanicMessage,
    /// Source location of the panic, when known
    PanicLocation,
    /// Captured backtrace
    Backtrace,
    /// Tail of the application log file
    ApplicationLog,
    /// Application-provided key/value pairs
    CustomData,
    /// Comment attached by the user before sending
    UserComment,
    /// Contact email attached by the user before sending
    UserEmail,
}

impl ReportField {
    /// The serialized key for this field.
    pub fn key(&self) -> &'static str {
        match self {
            ReportField::ReportId => "REPORT_ID",
            ReportField::AppName => "APP_NAME",
            ReportField::AppVersion => "APP_VERSION",
            ReportField::AgentVersion => "AGENT_VERSION",
            ReportField::InstanceId => "INSTANCE_ID",
            ReportField::Hostname => "HOSTNAME",
            ReportField::OsName => "OS_NAME",
            ReportField::Arch => "ARCH",
            ReportField::Pid => "PID",
            ReportField::ThreadName => "THREAD_NAME",
            ReportField::AppStartTime => "APP_START_TIME",
            ReportField::CrashTime => "CRASH_TIME",
            ReportField::IsSilent => "IS_SILENT",
            ReportField::PanicMessage => "PANIC_MESSAGE",
            ReportField::PanicLocation => "PANIC_LOCATION",
            ReportField::Backtrace => "BACKTRACE",
            ReportField::ApplicationLog => "APPLICATION_LOG",
            ReportField::CustomData => "CUSTOM_DATA",
            ReportField::UserComment => "USER_COMMENT",
            ReportField::UserEmail => "USER_EMAIL",
        }
    }
}

/// A single captured value.
///
/// Most fields are plain text; numeric and boolean values keep their type,
/// and `CustomData` carries a nested JSON element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportValue {
    /// Free-form text
    Text(String),
    /// Integer value
    Number(i64),
    /// Boolean flag
    Flag(bool),
    /// Nested structured element
    Structured(serde_json::Value),
}

impl std::fmt::Display for ReportValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportValue::Text(s) => write!(f, "{s}"),
            ReportValue::Number(n) => write!(f, "{n}"),
            ReportValue::Flag(b) => write!(f, "{b}"),
            ReportValue::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<String> for ReportValue {
    fn from(value: String) -> Self {
        ReportValue::Text(value)
    }
}

impl From<&str> for ReportValue {
    fn from(value: &str) -> Self {
        ReportValue::Text(value.to_string())
    }
}

impl From<i64> for ReportValue {
    fn from(value: i64) -> Self {
        ReportValue::Number(value)
    }
}

impl From<bool> for ReportValue {
    fn from(value: bool) -> Self {
        ReportValue::Flag(value)
    }
}

impl From<serde_json::Value> for ReportValue {
    fn from(value: serde_json::Value) -> Self {
        ReportValue::Structured(value)
    }
}

/// Ordered field map for one crash report.
///
/// Reports are filled once at capture time and are not modified afterwards,
/// with one exception: a user comment and contact email may be attached
/// before the first delivery attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrashReportData {
    fields: BTreeMap<ReportField, ReportValue>,
}

impl CrashReportData {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value.
    pub fn put(&mut self, field: ReportField, value: impl Into<ReportValue>) {
        self.fields.insert(field, value.into());
    }

    /// Remove a field, returning the previous value if it was set.
    pub fn remove(&mut self, field: ReportField) -> Option<ReportValue> {
        self.fields.remove(&field)
    }

    /// Get a field value.
    pub fn get(&self, field: ReportField) -> Option<&ReportValue> {
        self.fields.get(&field)
    }

    /// Get a field value as text, if it is set and textual.
    pub fn get_text(&self, field: ReportField) -> Option<&str> {
        match self.fields.get(&field) {
            Some(ReportValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Check whether a field is set.
    pub fn contains(&self, field: ReportField) -> bool {
        self.fields.contains_key(&field)
    }

    /// Whether this report was captured silently.
    pub fn is_silent(&self) -> bool {
        matches!(self.fields.get(&ReportField::IsSilent), Some(ReportValue::Flag(true)))
    }

    /// Number of populated fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the report has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&ReportField, &ReportValue)> {
        self.fields.iter()
    }
}
