//! Process-wide runtime snapshot.
//!
//! Everything about the process and host that every report shares. The
//! snapshot is taken once, on first use, and reused for every report the
//! process captures; nothing here changes between crashes.

use chrono::{DateTime, Utc};
use std::sync::OnceLock;
use uuid::Uuid;

static RUNTIME_INFO: OnceLock<RuntimeInfo> = OnceLock::new();

/// Static facts about the running process and its host.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    /// Identifier for this process, fresh per start
    pub instance_id: String,
    /// Hostname of the machine
    pub hostname: String,
    /// Operating system family
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// Process id
    pub pid: u32,
    /// Whether this is a debug build of the agent's host
    pub debug_build: bool,
    /// When the process started tracking
    pub start_time: DateTime<Utc>,
}

impl RuntimeInfo {
    /// The snapshot for this process, taken on first call.
    pub fn get() -> &'static RuntimeInfo {
        RUNTIME_INFO.get_or_init(Self::collect)
    }

    fn collect() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_default(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            pid: std::process::id(),
            debug_build: cfg!(debug_assertions),
            start_time: Utc::now(),
        }
    }
}
