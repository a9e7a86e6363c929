//! m2ha - MIDI to Home Assistant bridge
//!
//! Drives Home Assistant lights and switches from a MIDI control surface.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use crate::cli::{Cli, Commands};
use m2ha::config::{AppConfig, ConfigWatcher, Overrides, DEFAULT_CONFIG_PATH};
use m2ha::drivers::{ConsoleDriver, HomeAssistantDriver, ServiceDriver};
use m2ha::gateway::Gateway;
use m2ha::surface::{discovery, MidiSurface};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables (TOKEN, LOG_LEVEL) from .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let (config, config_path) = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Commands::List => discovery::print_ports(&config.midi.device),
        Commands::Run(args) => {
            let driver = HomeAssistantDriver::new(&config.home_assistant)
                .context("Failed to create HTTP client")?;
            if !driver.has_token() {
                warn!(
                    "{} environment variable not set; service calls will fail until it is",
                    driver.token_env()
                );
            }
            run_gateway(config, config_path, args.overrides(), Arc::new(driver), false).await
        }
        Commands::Monitor(args) => {
            let driver = Arc::new(ConsoleDriver::new("monitor"));
            run_gateway(config, config_path, args.overrides(), driver, true).await
        }
        Commands::Call { endpoint, body } => call_service(&config, &endpoint, &body).await,
    }
}

/// Load the named config file, or `m2ha.yaml` if present, or defaults
async fn load_config(path: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    if let Some(path) = path {
        let config = AppConfig::load(path).await?;
        info!("Configuration file: {}", path.display());
        return Ok((config, Some(path.to_path_buf())));
    }

    let (config, loaded) = AppConfig::load_or_default(DEFAULT_CONFIG_PATH).await?;
    if loaded {
        info!("Configuration file: {}", DEFAULT_CONFIG_PATH);
        Ok((config, Some(PathBuf::from(DEFAULT_CONFIG_PATH))))
    } else {
        info!("No {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
        Ok((config, None))
    }
}

async fn run_gateway(
    mut config: AppConfig,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    driver: Arc<dyn ServiceDriver>,
    monitor: bool,
) -> Result<()> {
    overrides.apply(&mut config);

    let mut surface = MidiSurface::connect(&config.midi.device).map_err(|e| {
        error!("{:#}", e);
        e
    })?;
    let events = surface
        .take_event_receiver()
        .ok_or_else(|| anyhow!("Failed to get MIDI event receiver"))?;

    let reloads = match config_path {
        Some(path) => match ConfigWatcher::new(path) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Config hot-reload disabled: {:#}", e);
                None
            }
        },
        None => None,
    };

    info!(
        "{} ready on '{}' (pid: {}) (Control+C to exit)",
        if monitor { "MIDI monitor" } else { "Bridge" },
        surface.port_name(),
        std::process::id()
    );

    Gateway::from_config(config, driver)
        .with_overrides(overrides)
        .with_event_log(monitor)
        .run(events, reloads, shutdown_signal())
        .await;

    drop(surface);
    info!("m2ha exiting");
    Ok(())
}

async fn call_service(config: &AppConfig, endpoint: &str, body: &str) -> Result<()> {
    let body: serde_json::Value =
        serde_json::from_str(body).with_context(|| format!("Invalid JSON body: {}", body))?;

    let driver = HomeAssistantDriver::new(&config.home_assistant)
        .context("Failed to create HTTP client")?;

    driver
        .call_service(endpoint, &body)
        .await
        .with_context(|| format!("Service call {} failed", endpoint))?;

    println!("{} {} {}", "✓".green().bold(), endpoint.bright_white(), body);
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Caught SIGINT"),
        _ = terminate => info!("Caught SIGTERM"),
    }
}
