//! mailcheck - SPF/DKIM/DMARC verification service and CLI
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP API and web UI
//! mailcheck serve --config mailcheck.toml
//!
//! # Verify a list (one address per line) and print the report
//! mailcheck verify emails.txt --csv
//!
//! # Clean a list, dropping domains without MX records
//! mailcheck clean emails.txt --check-mx
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailcheck_rs::api::ApiServer;
use mailcheck_rs::cleaner::{domain_breakdown, log_summary, EmailListCleaner};
use mailcheck_rs::config::{Config, LoggingConfig};
use mailcheck_rs::utils::{split_email_list, TrustDnsResolver};
use mailcheck_rs::verification::{BatchRunner, ProgressStore, RunOutcome, VerificationManager};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Config file picked up from the working directory when --config is absent
const DEFAULT_CONFIG_FILE: &str = "mailcheck.toml";

/// How often expired jobs are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "mailcheck", version)]
#[command(about = "Check SPF, DKIM and DMARC for email domains", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and web UI
    Serve {
        /// Override server.listen_addr
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Verify the domains of every address in a file
    Verify {
        /// Text file, one address per line
        file: PathBuf,
        /// Print CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },
    /// Clean an address list
    Clean {
        /// Text file, one address per line
        file: PathBuf,
        /// Drop addresses whose domain has no MX record
        #[arg(long)]
        check_mx: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.logging);

    match cli.command {
        Commands::Serve { listen } => serve(config, listen).await,
        Commands::Verify { file, csv } => verify(&config, &file, csv).await,
        Commands::Clean { file, check_mx } => clean(&config, &file, check_mx).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Config::from_file(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("failed to load {}", DEFAULT_CONFIG_FILE)),
        None => Ok(Config::default()),
    }
}

/// Logs go to stderr so command output on stdout stays clean
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mailcheck_rs={0},mailcheck={0},tower_http={0}", logging.level).into());
    let json = logging.format == "json";

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
        }))
        .init();
}

fn read_list(file: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    Ok(split_email_list(&text))
}

async fn serve(config: Config, listen: Option<String>) -> Result<()> {
    let addr = listen.unwrap_or_else(|| config.server.listen_addr.clone());
    info!("Starting mailcheck server");
    info!("  Listening on: {}", addr);
    info!("  DKIM selector: {}", config.verification.dkim_selector);
    info!("  Concurrency per job: {}", config.verification.concurrency);

    let resolver = TrustDnsResolver::from_config(&config.dns)?;
    let manager = VerificationManager::new(resolver.clone(), &config.verification);
    let cleaner = EmailListCleaner::new(&config.cleaner)?;
    let server = ApiServer::new(manager, cleaner, resolver, addr);

    let shutdown = CancellationToken::new();
    let sweeper = server.manager().spawn_sweeper(SWEEP_INTERVAL, shutdown.clone());

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
        signal.cancel();
    });

    let result = server.run_until(shutdown.clone()).await;
    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!("Sweeper task panic: {}", e);
    }

    result.context("API server error")
}

async fn verify(config: &Config, file: &Path, csv: bool) -> Result<()> {
    let emails = read_list(file)?;
    let resolver = TrustDnsResolver::from_config(&config.dns)?;
    let progress = ProgressStore::new(config.verification.log_tail);
    let runner = BatchRunner::new(resolver, progress.clone(), &config.verification);

    let job_id = uuid::Uuid::new_v4().to_string();
    progress.create(&job_id).await;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    match runner.run(&job_id, emails, cancel).await? {
        RunOutcome::Completed(report) => {
            if csv {
                print!("{}", report.to_csv());
            } else {
                println!("{}", serde_json::to_string_pretty(&*report)?);
            }
            Ok(())
        }
        RunOutcome::Cancelled { processed, total } => {
            anyhow::bail!("verification cancelled after {}/{} domains", processed, total)
        }
    }
}

async fn clean(config: &Config, file: &Path, check_mx: bool) -> Result<()> {
    let emails = read_list(file)?;
    let cleaner = EmailListCleaner::new(&config.cleaner)?;

    let result = if check_mx {
        let resolver = TrustDnsResolver::from_config(&config.dns)?;
        cleaner.clean_with_mx(&emails, &resolver).await
    } else {
        cleaner.clean(&emails)
    };
    log_summary(&result.stats);

    for domain in domain_breakdown(&result.emails, 10) {
        info!("  {:<30} {:>8}", domain.domain, domain.count);
    }
    for email in &result.emails {
        println!("{}", email);
    }

    Ok(())
}
