//! Email sender delivering reports over SMTP.
//!
//! The report is rendered as a plain-text field dump, one `KEY=value` line
//! per field in report order, and mailed to a fixed recipient.

use crate::report::{CrashReportData, ReportField};
use crate::sender::{ReportSender, SenderError};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};

/// Email sender configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSenderConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port. Common values: 587 (STARTTLS), 25 (unencrypted)
    pub smtp_port: u16,
    /// Optional username for SMTP authentication
    pub username: Option<String>,
    /// Optional password for SMTP authentication
    pub password: Option<String>,
    /// Whether to negotiate STARTTLS
    pub use_tls: bool,
    /// Sender address for report mails
    pub from: String,
    /// Recipient address for report mails
    pub to: String,
}

impl EmailSenderConfig {
    /// Create a configuration for the given server and addresses.
    pub fn new(
        smtp_host: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            smtp_host: smtp_host.into(),
            smtp_port: 587,
            username: None,
            password: None,
            use_tls: true,
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Sender that mails reports to a fixed recipient.
pub struct EmailSender {
    transport: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    /// Create a new email sender.
    ///
    /// Validates the addresses and builds the SMTP transport; the actual
    /// connection is made lazily on the first send.
    pub fn new(config: EmailSenderConfig) -> Result<Self, SenderError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| SenderError::Config(format!("Invalid from address: {e}")))?;
        let to: Mailbox = config
            .to
            .parse()
            .map_err(|e| SenderError::Config(format!("Invalid to address: {e}")))?;

        let builder = if config.use_tls {
            SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| SenderError::Config(format!("Invalid SMTP relay: {e}")))?
        } else {
            SmtpTransport::builder_dangerous(&config.smtp_host)
        };

        let mut builder = builder.port(config.smtp_port);
        if let (Some(username), Some(password)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    /// Subject line for a report mail.
    fn subject(report: &CrashReportData) -> String {
        let app = report
            .get_text(ReportField::AppName)
            .unwrap_or("application");
        format!("{app} crash report")
    }

    /// Render a report as one `KEY=value` line per field.
    fn render(report: &CrashReportData) -> String {
        let mut body = String::new();
        for (field, value) in report.iter() {
            body.push_str(field.key());
            body.push('=');
            body.push_str(&value.to_string());
            body.push('\n');
        }
        body
    }
}

impl ReportSender for EmailSender {
    fn name(&self) -> &str {
        "email"
    }

    fn send(&self, report: &CrashReportData) -> Result<(), SenderError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(Self::subject(report))
            .body(Self::render(report))
            .map_err(|e| SenderError::Serialization(e.to_string()))?;

        self.transport
            .send(&message)
            .map_err(|e| SenderError::Network(e.to_string()))?;

        Ok(())
    }
}
