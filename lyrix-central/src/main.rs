//! Lyrix Central (lyrix-central) - Main entry point
//!
//! Builds the active-source dispatcher and source registry, attaches the lyric
//! display, and replays a JSON-lines event script against them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lyrix_central::display::LyricDisplay;
use lyrix_central::script::{load_script, ScriptRunner};
use lyrix_central::{ActiveSourceDispatcher, SourceRegistry};
use lyrix_common::config::CentralConfig;
use tokio::runtime::Handle;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lyrix-central
#[derive(Parser, Debug)]
#[command(name = "lyrix-central")]
#[command(about = "Active-source arbitration and lyric timing for Lyrix")]
#[command(version)]
struct Args {
    /// Configuration file (overrides LYRIX_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-lines event script to replay
    #[arg(short, long)]
    script: PathBuf,

    /// Keep running after the script until Ctrl+C
    #[arg(long)]
    wait: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = CentralConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lyrix Central");
    info!(
        "Position update interval: {}ms (min {}ms)",
        config.position_update_interval_ms, config.min_position_update_interval_ms
    );

    let dispatcher = Arc::new(ActiveSourceDispatcher::new());
    let lyric_display = Arc::new(LyricDisplay::new());
    dispatcher.register_listener(lyric_display.clone());

    let registry = SourceRegistry::new(dispatcher.clone(), config, Handle::current());

    let steps = load_script(&args.script)
        .with_context(|| format!("Failed to load script {}", args.script.display()))?;
    info!("Replaying {} steps from {}", steps.len(), args.script.display());

    let mut runner = ScriptRunner::new(registry.clone());
    runner.run(&steps).await.context("Script replay failed")?;

    match dispatcher.active_source() {
        Some(source) => info!(
            "Active source: {} (playing: {})",
            source,
            dispatcher.active_is_playing()
        ),
        None => info!("No active source"),
    }
    let frame = lyric_display.frame();
    info!("Display: {:?}", frame);

    if args.wait {
        shutdown_signal().await;
    }

    info!("Lyrix Central shutdown complete ({} sources)", registry.len());
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
