//! Agent façade tying capture, storage and delivery together.
//!
//! Host applications configure and start the agent once at startup:
//!
//! ```no_run
//! use faultline::{Agent, Config};
//!
//! let mut config = Config::load().unwrap_or_default();
//! config.app_name = "demo".to_string();
//! let agent = Agent::builder(config).build().expect("faultline init failed");
//! # drop(agent);
//! ```
//!
//! `build` prepares the store (partitions plus legacy migration), constructs
//! the configured senders, starts the background send worker, installs the
//! panic hook and queues a startup pass for reports left over from earlier
//! runs.

use crate::capture::builder::ReportBuilder;
use crate::capture::hook::install_panic_hook;
use crate::capture::runtime::RuntimeInfo;
use crate::config::{Config, ConfigError};
use crate::report::persister::{self, PersistError};
use crate::sender::retry::{DefaultRetryPolicy, RetryPolicy};
use crate::sender::service::{PassSummary, SenderCore, SenderService};
use crate::sender::{senders_from_config, ReportSender, SenderError};
use crate::stats::{create_shared_stats_with_persistence, SharedDeliveryStats};
use crate::store::locator::{Partition, ReportLocator, StoreError};
use crate::store::migration::migrate_legacy_reports;
use crate::store::filename;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Builds one sender at init time.
///
/// Registered through [`AgentBuilder::sender_factory`] for backends the
/// serialized configuration cannot describe.
pub type SenderFactory =
    Box<dyn Fn(&Config) -> Result<Box<dyn ReportSender>, SenderError> + Send + Sync>;

/// Agent initialization errors.
#[derive(Debug)]
pub enum InitError {
    /// Configuration or directory setup failed
    Config(ConfigError),
    /// Report store could not be prepared
    Store(StoreError),
    /// A configured sender could not be built
    Sender(SenderError),
    /// No delivery backend is configured
    NoSenders,
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::Config(e) => write!(f, "Config error: {e}"),
            InitError::Store(e) => write!(f, "Store error: {e}"),
            InitError::Sender(e) => write!(f, "Sender error: {e}"),
            InitError::NoSenders => write!(
                f,
                "No report sender is configured; declare a backend or register a sender factory"
            ),
        }
    }
}

impl std::error::Error for InitError {}

impl From<ConfigError> for InitError {
    fn from(e: ConfigError) -> Self {
        InitError::Config(e)
    }
}

impl From<StoreError> for InitError {
    fn from(e: StoreError) -> Self {
        InitError::Store(e)
    }
}

impl From<SenderError> for InitError {
    fn from(e: SenderError) -> Self {
        InitError::Sender(e)
    }
}

/// Configures and starts an [`Agent`].
pub struct AgentBuilder {
    config: Config,
    factories: Vec<SenderFactory>,
    policy: Option<Box<dyn RetryPolicy>>,
    panic_hook: bool,
    startup_pass: bool,
}

impl AgentBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            factories: Vec::new(),
            policy: None,
            panic_hook: true,
            startup_pass: true,
        }
    }

    /// Register a factory for an additional sender.
    ///
    /// Factory senders run after the config-declared backends, in
    /// registration order.
    pub fn sender_factory(mut self, factory: SenderFactory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Replace the default retry policy.
    pub fn retry_policy(mut self, policy: Box<dyn RetryPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Skip installing the panic hook; reports then only come from
    /// [`Agent::handle_report`].
    pub fn without_panic_hook(mut self) -> Self {
        self.panic_hook = false;
        self
    }

    /// Skip the pass normally queued at startup for leftover reports.
    pub fn without_startup_pass(mut self) -> Self {
        self.startup_pass = false;
        self
    }

    /// Initialize the agent.
    pub fn build(self) -> Result<Agent, InitError> {
        self.config.ensure_directories()?;

        let locator = ReportLocator::new(&self.config.data_path);
        locator.ensure_partitions()?;
        migrate_legacy_reports(&locator);

        let mut senders = senders_from_config(&self.config)?;
        for factory in &self.factories {
            senders.push(factory(&self.config)?);
        }
        if senders.is_empty() {
            return Err(InitError::NoSenders);
        }

        let stats = create_shared_stats_with_persistence(
            self.config.data_path.join("delivery_stats.json"),
        );

        let policy = self.policy.unwrap_or_else(|| Box::new(DefaultRetryPolicy));
        let core = Arc::new(
            SenderCore::new(
                locator.clone(),
                senders,
                policy,
                RuntimeInfo::get().debug_build,
                self.config.send_in_dev_mode,
                self.config.max_reports_per_pass,
            )
            .with_stats(stats.clone()),
        );
        let service = SenderService::start(core.clone());

        let agent = Agent {
            inner: Arc::new(AgentInner {
                config: self.config,
                locator,
                stats,
                core,
                service: Mutex::new(Some(service)),
            }),
        };

        if self.panic_hook {
            install_panic_hook(agent.clone());
        }
        if self.startup_pass {
            // Pick up reports a previous run left behind.
            agent.request_send_pass(false, !agent.inner.config.require_approval);
        }

        info!(
            "faultline agent started for {} (instance {})",
            agent.inner.config.app_name,
            RuntimeInfo::get().instance_id
        );
        Ok(agent)
    }
}

struct AgentInner {
    config: Config,
    locator: ReportLocator,
    stats: SharedDeliveryStats,
    core: Arc<SenderCore>,
    service: Mutex<Option<SenderService>>,
}

/// Handle to a running crash-reporting agent.
///
/// Clones share the same store, worker and stats.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    /// Start configuring an agent.
    pub fn builder(config: Config) -> AgentBuilder {
        AgentBuilder::new(config)
    }

    /// The effective configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The report store.
    pub fn locator(&self) -> &ReportLocator {
        &self.inner.locator
    }

    /// Delivery counters.
    pub fn stats(&self) -> &SharedDeliveryStats {
        &self.inner.stats
    }

    /// Capture a report and queue a send pass for it.
    ///
    /// Returns the path of the stored report file. Silent reports go
    /// straight to the approved partition; interactive ones wait in
    /// unapproved until approved (automatically, unless the configuration
    /// requires explicit approval).
    pub fn handle_report(&self, builder: ReportBuilder) -> Result<PathBuf, PersistError> {
        let path = self.persist_report(builder)?;
        self.request_send_pass(false, !self.inner.config.require_approval);
        Ok(path)
    }

    /// Capture a report without triggering delivery.
    pub(crate) fn persist_report(&self, builder: ReportBuilder) -> Result<PathBuf, PersistError> {
        let silent = builder.is_silent(&self.inner.config);
        let data = builder.build(&self.inner.config);

        let mut path = self
            .inner
            .locator
            .dir(Partition::Unapproved)
            .join(filename::new_report_name(silent));
        persister::store(&data, &path)?;

        // Silent reports need no approval; a failed rename leaves the report
        // in unapproved, where a later approve-first pass picks it up.
        if silent {
            match self.inner.locator.approve(&path) {
                Ok(approved) => path = approved,
                Err(e) => warn!("Could not auto-approve silent report {path:?}: {e}"),
            }
        }

        self.inner.stats.record_report_captured();
        info!("Captured crash report {path:?}");
        Ok(path)
    }

    /// Attach a user comment and contact email to a stored report.
    ///
    /// Must happen before the report's first delivery attempt.
    pub fn attach_user_feedback(
        &self,
        report: &Path,
        comment: Option<&str>,
        email: Option<&str>,
    ) -> Result<(), PersistError> {
        persister::attach_user_feedback(report, comment, email)
    }

    /// Move every unapproved report into the approved partition.
    pub fn approve_all(&self) -> usize {
        self.inner.locator.approve_all()
    }

    /// Queue a send pass on the background worker.
    pub fn request_send_pass(&self, only_silent: bool, approve_first: bool) {
        let service = self
            .inner
            .service
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match service.as_ref() {
            Some(service) => service.request_pass(only_silent, approve_first),
            None => {
                self.inner.core.run_send_pass(only_silent, approve_first);
            }
        }
    }

    /// Run a send pass and wait for it, then persist the stats.
    ///
    /// Used at crash time and before orderly shutdown, so nothing eligible
    /// is left unsent when the process goes away.
    pub fn flush(&self) -> PassSummary {
        let summary = {
            let service = self
                .inner
                .service
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let approve_first = !self.inner.config.require_approval;
            match service.as_ref() {
                Some(service) => service.run_pass_blocking(false, approve_first),
                None => self.inner.core.run_send_pass(false, approve_first),
            }
        };
        if let Err(e) = self.inner.stats.save() {
            warn!("Could not save delivery stats: {e}");
        }
        summary
    }

    /// Drain queued passes, stop the worker and persist the stats.
    ///
    /// The agent keeps working after shutdown, but passes then run on the
    /// calling thread.
    pub fn shutdown(&self) {
        let service = {
            let mut guard = self
                .inner
                .service
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.take()
        };
        if let Some(mut service) = service {
            service.shutdown();
        }
        if let Err(e) = self.inner.stats.save() {
            warn!("Could not save delivery stats: {e}");
        }
    }
}
