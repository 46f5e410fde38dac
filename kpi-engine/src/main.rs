//! kpi-engine - KPI evaluation and scoring service
//!
//! Serves the evaluation, value and dashboard API and runs the daily due
//! sweep in the background.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kpi_common::config::ConfigResolver;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use kpi_engine::schedule::spawn_sweep_loop;
use kpi_engine::sources::HttpSourceFetcher;
use kpi_engine::AppState;

/// Command-line arguments for kpi-engine
#[derive(Parser, Debug)]
#[command(name = "kpi-engine")]
#[command(about = "KPI evaluation and scoring service")]
#[command(version)]
struct Args {
    /// SQLite database file (overrides KPI_DATABASE and the config file)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:5740 (overrides KPI_BIND and the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// TOML config file
    #[arg(short, long, env = "KPI_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigResolver::new()
        .with_database(args.database)
        .with_bind_address(args.bind)
        .with_config_file(args.config)
        .resolve()
        .context("Failed to resolve configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting kpi-engine v{}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database_path.display());

    let db = kpi_engine::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let fetcher = Arc::new(HttpSourceFetcher::new().context("Failed to build HTTP client")?);
    let state = AppState::new(db, fetcher, config.scheduler.workers);

    let shutdown = CancellationToken::new();
    let sweep_task = if config.scheduler.enabled {
        info!(
            hour_utc = config.scheduler.hour_utc,
            workers = config.scheduler.workers,
            "Due sweep enabled"
        );
        Some(spawn_sweep_loop(
            Arc::clone(&state.scheduler),
            config.scheduler.hour_utc,
            shutdown.clone(),
        ))
    } else {
        info!("Due sweep disabled");
        None
    };

    let app = kpi_engine::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Some(task) = sweep_task {
        task.await.context("Sweep loop panicked")?;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
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
