//! HTTP sender posting reports to a remote collector.
//!
//! The report is serialized as JSON and POSTed to a configured endpoint.
//! The async client does the actual work; [`BlockingHttpSender`] wraps it
//! in a private runtime so it can serve the blocking sender contract.

use crate::report::CrashReportData;
use crate::sender::{ReportSender, SenderError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// HTTP sender configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSenderConfig {
    /// Collector endpoint receiving the report JSON
    pub endpoint: String,
    /// Bearer authentication token
    pub token: Option<String>,
    /// Extra headers added to every request
    pub headers: BTreeMap<String, String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl HttpSenderConfig {
    /// Create a configuration for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            headers: BTreeMap::new(),
            timeout_secs: 10,
        }
    }
}

/// Async HTTP sender.
pub struct HttpSender {
    config: HttpSenderConfig,
    client: reqwest::Client,
}

impl HttpSender {
    /// Create a new HTTP sender.
    pub fn new(config: HttpSenderConfig) -> Result<Self, SenderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SenderError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// POST one report to the collector endpoint.
    pub async fn post_report(&self, report: &CrashReportData) -> Result<(), SenderError> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json");

        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .json(report)
            .send()
            .await
            .map_err(|e| SenderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SenderError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    /// The configured collector endpoint.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

/// Blocking HTTP sender for use on the send worker.
pub struct BlockingHttpSender {
    inner: HttpSender,
    runtime: tokio::runtime::Runtime,
}

impl BlockingHttpSender {
    /// Create a new blocking HTTP sender.
    pub fn new(config: HttpSenderConfig) -> Result<Self, SenderError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SenderError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: HttpSender::new(config)?,
            runtime,
        })
    }

    /// The configured collector endpoint.
    pub fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }
}

impl ReportSender for BlockingHttpSender {
    fn name(&self) -> &str {
        "http"
    }

    fn send(&self, report: &CrashReportData) -> Result<(), SenderError> {
        self.runtime.block_on(self.inner.post_report(report))
    }
}
