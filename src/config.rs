//! Configuration for the faultline crash-reporting agent.

use crate::sender::email::EmailSenderConfig;
use crate::sender::http::HttpSenderConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the agent.
///
/// Delivery backends declared here are built at init time; programmatic
/// senders and a custom retry policy go through the `AgentBuilder` instead
/// of the serialized file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the monitored application, used in reports and mail subjects
    pub app_name: String,

    /// Version of the monitored application
    pub app_version: String,

    /// Path for storing reports and delivery stats
    pub data_path: PathBuf,

    /// Upper bound on reports handled in one send pass
    pub max_reports_per_pass: usize,

    /// Whether debug builds may deliver reports
    pub send_in_dev_mode: bool,

    /// Whether reports wait for explicit approval before delivery
    pub require_approval: bool,

    /// Whether the panic hook runs a blocking send pass before the process dies
    pub send_on_crash: bool,

    /// Whether hook-captured reports carry the silent marker
    pub silent_by_default: bool,

    /// Application log file whose tail is attached to reports
    pub application_log_file: Option<PathBuf>,

    /// How many log lines to attach
    pub application_log_lines: usize,

    /// HTTP collector backend
    pub http: Option<HttpSenderConfig>,

    /// SMTP email backend
    pub email: Option<EmailSenderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("faultline");

        Self {
            app_name: default_app_name(),
            app_version: String::new(),
            data_path: data_dir,
            max_reports_per_pass: 5,
            send_in_dev_mode: false,
            require_approval: false,
            send_on_crash: true,
            silent_by_default: true,
            application_log_file: None,
            application_log_lines: 100,
            http: None,
            email: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("faultline")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Whether any delivery backend is declared in this configuration.
    pub fn has_backend(&self) -> bool {
        self.http.is_some() || self.email.is_some()
    }
}

/// Name of the running executable, used when the host application does not
/// set one.
fn default_app_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| "application".to_string())
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_reports_per_pass, 5);
        assert!(!config.send_in_dev_mode);
        assert!(!config.require_approval);
        assert!(config.send_on_crash);
        assert!(config.silent_by_default);
        assert_eq!(config.application_log_lines, 100);
        assert!(!config.has_backend());
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.app_name = "demo".to_string();
        config.http = Some(HttpSenderConfig::new("https://crash.example.com/ingest"));

        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(back.app_name, "demo");
        assert!(back.has_backend());
        assert_eq!(
            back.http.unwrap().endpoint,
            "https://crash.example.com/ingest"
        );
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_path: dir.path().join("nested").join("data"),
            ..Default::default()
        };

        config.ensure_directories().unwrap();
        assert!(config.data_path.is_dir());
    }
}
