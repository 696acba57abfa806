//! Harvest Scheduler
//!
//! Runs the configured crawl sites on a daily schedule.
//!
//! Architecture:
//! - Configuration: Load settings from environment, falling back to defaults for unset values
//! - Sites: Read-only site registry loaded once from YAML
//! - Services: Run registry (one active run per site) and dispatcher
//! - Scheduler: Recurrence engine polling the daily trigger plan
//! - API: Optional status endpoints over HTTP
//!
//! The engine fires one batch of every site per day plus one staggered
//! trigger per site, launching each run in its own task.

mod api;
mod config;
mod scheduler;
mod service;
mod sites;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harvest_core::domain::schedule::{RecurrenceRule, RuleAction};
use harvest_core::domain::site::SiteCategory;
use harvest_crawl::{DbSink, HandlerRegistry, JsonlFileSink, PageCrawler, SinkSet, StorageSink};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::scheduler::{LocalClock, RecurrenceEngine};
use crate::service::{DispatchError, DispatchOutcome, Dispatcher, RunRegistry};
use crate::sites::SiteRegistry;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Scheduled multi-site content crawler", long_about = None)]
struct Cli {
    /// Site file (overrides HARVEST_SITES)
    #[arg(long)]
    sites: Option<PathBuf>,

    /// Output directory of crawled records (overrides HARVEST_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduling loop until interrupted (default)
    Start {
        /// Skip the batch normally run at startup
        #[arg(long)]
        no_run_on_start: bool,
    },
    /// Run every site once, wait for all of them and exit
    Once,
    /// Run a single site and wait for it
    Run {
        /// Site identifier
        site_id: String,
    },
    /// List configured sites with their handler and daily trigger
    Sites,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config()?;
    if let Some(sites) = cli.sites {
        config.sites_path = sites;
    }
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }

    // Initialize logging
    let log_file = init_logging(config.log_dir.as_deref())?;
    if let Some(path) = log_file {
        info!("Logging to {}", path.display());
    }

    let dispatcher = build_dispatcher(&config).await?;

    match cli.command.unwrap_or(Commands::Start {
        no_run_on_start: false,
    }) {
        Commands::Start { no_run_on_start } => {
            if no_run_on_start {
                config.run_on_start = false;
            }
            start(config, dispatcher).await
        }
        Commands::Once => {
            let batch = dispatcher.run_all().await;
            info!("Launched {} site(s), waiting for completion", batch.len());
            let summary = batch.wait().await;
            info!("Crawl finished: {}", summary);
            Ok(())
        }
        Commands::Run { site_id } => match dispatcher.run_one(&site_id).await {
            DispatchOutcome::Skipped(DispatchError::UnknownJob(id)) => {
                anyhow::bail!("site '{}' is not configured", id)
            }
            outcome if outcome.is_success() => {
                info!("Site {}: {}", site_id, outcome);
                Ok(())
            }
            outcome => anyhow::bail!("site '{}' {}", site_id, outcome),
        },
        Commands::Sites => {
            list_sites(&config, &dispatcher);
            Ok(())
        }
    }
}

/// Loads configuration from environment variables
///
/// A malformed or invalid setting is fatal.
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Invalid configuration in environment")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Installs the stdout subscriber, plus a plain-text file layer when a log
/// directory is configured
///
/// Returns the log file path, if any.
fn init_logging(log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "harvest_scheduler=info,harvest_crawl=info,tower_http=info".into()
    });

    let (file_layer, log_file) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = log_file_path(dir, chrono::Local::now().naive_local());
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(log_file)
}

/// One log file per process start
fn log_file_path(dir: &Path, started: chrono::NaiveDateTime) -> PathBuf {
    dir.join(format!("harvest_{}.log", started.format("%Y%m%d_%H%M%S")))
}

/// Loads sites and wires handlers, sinks and the run registry together
///
/// Failures here are the only fatal errors of the process.
async fn build_dispatcher(config: &Config) -> Result<Arc<Dispatcher>> {
    let sites = SiteRegistry::load(&config.sites_path)
        .with_context(|| format!("Failed to load sites from {}", config.sites_path.display()))?;
    if sites.is_empty() {
        warn!("No sites configured in {}", config.sites_path.display());
    } else {
        info!(
            "Loaded {} site(s) from {}",
            sites.len(),
            config.sites_path.display()
        );
    }

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(concat!("harvest/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let mut handlers = HandlerRegistry::new();
    for category in SiteCategory::ALL {
        handlers.register_category(category, PageCrawler::for_category(category, client.clone()));
    }

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    let mut sinks: Vec<Arc<dyn StorageSink>> = Vec::new();
    if let Some(database_url) = &config.database_url {
        let db = DbSink::connect(database_url)
            .await
            .context("Failed to connect database sink")?;
        sinks.push(Arc::new(db));
    }
    sinks.push(Arc::new(JsonlFileSink::new(&config.output_dir)));
    let sinks = SinkSet::new(sinks);
    info!("Storage sinks: {}", sinks.names().join(", "));

    Ok(Arc::new(Dispatcher::new(
        Arc::new(sites),
        Arc::new(handlers),
        Arc::new(RunRegistry::new()),
        sinks,
        config.dispatch_settings(),
    )))
}

/// Serves the status API (if configured) and runs the engine until interrupted
async fn start(config: Config, dispatcher: Arc<Dispatcher>) -> Result<()> {
    info!("Starting Harvest scheduler");

    if let Some(addr) = config.status_addr {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind status API to {}", addr))?;
        info!("Status API listening on {}", addr);

        let app = api::create_router(Arc::clone(&dispatcher));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Status API error: {}", e);
            }
        });
    }

    let engine = RecurrenceEngine::from_config(&config, dispatcher, Arc::new(LocalClock));
    engine.run(shutdown_signal()).await;

    info!("Harvest scheduler stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Interrupt received, stopping"),
        _ = terminate => info!("Terminate signal received, stopping"),
    }
}

/// Prints every site with its resolved handler and daily trigger
fn list_sites(config: &Config, dispatcher: &Dispatcher) {
    let rules = RecurrenceRule::daily_plan(
        config.batch_time,
        config.site_base_hour,
        dispatcher.sites().ids(),
    );

    println!("Batch of all sites runs daily at {}", config.batch_time);
    println!();

    for site in dispatcher.sites().iter() {
        let trigger = rules
            .iter()
            .find(|r| r.action == RuleAction::RunOne(site.id.clone()))
            .map(|r| r.at.to_string())
            .unwrap_or_else(|| "-".to_string());

        let handler = match dispatcher.handlers().resolve(&site.id, site) {
            Ok(resolved) => format!("{} ({})", resolved.handler.id(), resolved.resolution),
            Err(e) => format!("unresolved: {}", e),
        };

        println!("{:<20} {:<30} {}  {}", site.id, site.name, trigger, handler);
    }
}
