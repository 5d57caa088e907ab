//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "binary"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Binary entrypoint for the splitwatch daemon."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use splitwatch_api::{spawn_api_server, ApiServer, ApiState};
use splitwatch_common::{init_tracing, AppConfig, VersionInfo};
use splitwatch_metrics::{new_registry, spawn_http_server, DaemonMetrics, SharedRegistry};
use splitwatch_store::{StoreContext, StoreMetrics};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "splitwatch daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Serve the record API (default)")]
    Run,
    #[command(about = "Load and validate configuration, then exit")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.extended());
        return Ok(());
    }
    let load_started = Instant::now();
    let loaded = AppConfig::resolve(
        cli.config.as_deref(),
        &[PathBuf::from("configs/splitwatch.toml")],
    )?;
    let config = loaded.config;
    let load_duration = load_started.elapsed();

    let metrics_registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(metrics_registry.clone())?;
    daemon_metrics.record_startup(load_duration, &version.semver, &version.profile);

    init_tracing("splitwatchd", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(config = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config, metrics_registry, version).await?,
        Commands::CheckConfig => {
            let source = loaded
                .source
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<defaults>".to_owned());
            println!("configuration ok ({source})");
            match config.store.resolve_database_url() {
                Some(_) => println!("primary store: configured"),
                None => println!("primary store: not configured (in-memory only)"),
            }
        }
    }

    Ok(())
}

async fn run_daemon(
    config: AppConfig,
    metrics_registry: SharedRegistry,
    version: VersionInfo,
) -> Result<()> {
    let metrics_settings = config.metrics.clone();
    let api_settings = config.api.clone();

    let store_metrics = StoreMetrics::new(metrics_registry.clone())
        .context("failed to register store metrics")?;
    let store = StoreContext::start(&config.store, Some(store_metrics))?;

    let metrics_server = if metrics_settings.enabled {
        info!(address = %metrics_settings.listen, "metrics exporter enabled");
        Some(spawn_http_server(metrics_registry, metrics_settings.listen)?)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let mut api_server: Option<ApiServer> = None;
    if api_settings.enabled {
        let static_dir = api_settings.static_dir.clone().and_then(|dir| {
            if dir.is_dir() {
                Some(dir)
            } else {
                warn!(static_dir = %dir.display(), "api static_dir not found; serving API without assets");
                None
            }
        });
        let state = Arc::new(ApiState::with_router(store.router(), version.clone()));
        match spawn_api_server(state, api_settings.listen, static_dir) {
            Ok(server) => api_server = Some(server),
            Err(err) => {
                warn!(error = %err, "failed to start api server");
            }
        }
    } else {
        info!("api server disabled by configuration");
    }

    info!(version = %version.cli_string(), "daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    if let Some(server) = api_server {
        server.shutdown().await?;
    }
    store.shutdown().await;

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }

    Ok(())
}
