//! faultline CLI
//!
//! Operational companion for a faultline deployment: run send passes,
//! inspect and approve stored reports, and smoke-test delivery.

use clap::{Parser, Subcommand};
use faultline::{
    capture::ReportBuilder,
    config::Config,
    report::persister,
    sender::{senders_from_config, DefaultRetryPolicy, NullSender, ReportSender, SenderCore},
    stats::create_shared_stats_with_persistence,
    store::{filename, migrate_legacy_reports, Partition, ReportLocator},
    VERSION,
};
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "faultline")]
#[command(version = VERSION)]
#[command(about = "Crash report capture, storage and delivery", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one send pass over stored reports
    Send {
        /// Only send reports carrying the silent filename marker
        #[arg(long)]
        only_silent: bool,

        /// Approve all unapproved reports before the pass
        #[arg(long)]
        approve_first: bool,

        /// Override the configured per-pass report limit
        #[arg(long)]
        max: Option<usize>,
    },

    /// Show pending reports and delivery statistics
    Status,

    /// Move all unapproved reports to the approved partition
    Approve,

    /// Attach a user comment and contact email to a stored report
    Annotate {
        /// Path of the report file
        report: PathBuf,

        /// Comment to attach
        #[arg(long)]
        comment: Option<String>,

        /// Contact email to attach
        #[arg(long)]
        email: Option<String>,
    },

    /// Move legacy flat-layout reports into the partitioned store
    Migrate,

    /// Delete stored reports
    Purge {
        /// Delete approved reports
        #[arg(long)]
        approved: bool,

        /// Delete unapproved reports
        #[arg(long)]
        unapproved: bool,

        /// Delete reports from both partitions
        #[arg(long)]
        all: bool,
    },

    /// Write a synthetic crash report for smoke-testing delivery
    Simulate {
        /// Panic message for the synthetic report
        #[arg(long, default_value = "faultline delivery test")]
        message: String,

        /// Mark the report as silent
        #[arg(long)]
        silent: bool,
    },

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FAULTLINE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Send {
            only_silent,
            approve_first,
            max,
        } => cmd_send(only_silent, approve_first, max),
        Commands::Status => cmd_status(),
        Commands::Approve => cmd_approve(),
        Commands::Annotate {
            report,
            comment,
            email,
        } => cmd_annotate(&report, comment.as_deref(), email.as_deref()),
        Commands::Migrate => cmd_migrate(),
        Commands::Purge {
            approved,
            unapproved,
            all,
        } => cmd_purge(approved, unapproved, all),
        Commands::Simulate { message, silent } => cmd_simulate(&message, silent),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_send(
    only_silent: bool,
    approve_first: bool,
    max: Option<usize>,
) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    config.ensure_directories()?;

    let mut senders = senders_from_config(&config)?;
    if senders.is_empty() {
        eprintln!("Warning: no delivery backend configured, reports will be dropped");
        senders.push(Box::new(NullSender) as Box<dyn ReportSender>);
    }

    let locator = ReportLocator::new(&config.data_path);
    locator.ensure_partitions()?;

    let stats = create_shared_stats_with_persistence(config.data_path.join("delivery_stats.json"));
    let core = SenderCore::new(
        locator,
        senders,
        Box::new(DefaultRetryPolicy),
        cfg!(debug_assertions),
        config.send_in_dev_mode,
        max.unwrap_or(config.max_reports_per_pass),
    )
    .with_stats(stats.clone());

    let summary = core.run_send_pass(only_silent, approve_first);
    stats.save()?;

    println!("Send pass complete: {summary}");
    Ok(())
}

fn cmd_status() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let locator = ReportLocator::new(&config.data_path);

    println!("faultline status");
    println!("================");
    println!();
    println!("Data directory: {:?}", config.data_path);
    println!(
        "Unapproved reports: {}",
        locator.reports(Partition::Unapproved).len()
    );
    println!(
        "Approved reports: {}",
        locator.reports(Partition::Approved).len()
    );
    println!();

    let stats_path = config.data_path.join("delivery_stats.json");
    if stats_path.exists() {
        let stats = create_shared_stats_with_persistence(stats_path);
        println!("{}", stats.summary());
    } else {
        println!("No delivery statistics recorded yet.");
    }
    Ok(())
}

fn cmd_approve() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let locator = ReportLocator::new(&config.data_path);

    let moved = locator.approve_all();
    println!("Approved {moved} report(s).");
    Ok(())
}

fn cmd_annotate(
    report: &std::path::Path,
    comment: Option<&str>,
    email: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    if comment.is_none() && email.is_none() {
        return Err("nothing to attach; pass --comment and/or --email".into());
    }

    persister::attach_user_feedback(report, comment, email)?;
    println!("Annotated {report:?}.");
    Ok(())
}

fn cmd_migrate() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let locator = ReportLocator::new(&config.data_path);

    let summary = migrate_legacy_reports(&locator);
    println!(
        "Migrated {} report(s), {} left in place.",
        summary.migrated, summary.failed
    );
    Ok(())
}

fn cmd_purge(approved: bool, unapproved: bool, all: bool) -> Result<(), Box<dyn Error>> {
    if !(approved || unapproved || all) {
        return Err("pass --approved, --unapproved or --all".into());
    }

    let config = Config::load()?;
    let locator = ReportLocator::new(&config.data_path);

    let mut deleted = 0;
    let mut partitions = Vec::new();
    if approved || all {
        partitions.push(Partition::Approved);
    }
    if unapproved || all {
        partitions.push(Partition::Unapproved);
    }

    for partition in partitions {
        for report in locator.reports(partition) {
            match locator.delete(&report) {
                Ok(()) => deleted += 1,
                Err(e) => eprintln!("Warning: could not delete {report:?}: {e}"),
            }
        }
    }

    println!("Deleted {deleted} report(s).");
    Ok(())
}

fn cmd_simulate(message: &str, silent: bool) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    config.ensure_directories()?;

    let locator = ReportLocator::new(&config.data_path);
    locator.ensure_partitions()?;

    let data = ReportBuilder::new(message)
        .silent(silent)
        .capture_backtrace()
        .build(&config);
    let mut path = locator
        .dir(Partition::Unapproved)
        .join(filename::new_report_name(silent));
    persister::store(&data, &path)?;

    // Silent reports need no approval; auto-approve like the capture path.
    if silent {
        path = locator.approve(&path)?;
    }

    println!("Wrote synthetic report {path:?}.");
    println!("Run `faultline send` to deliver it.");
    Ok(())
}

fn cmd_config() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
