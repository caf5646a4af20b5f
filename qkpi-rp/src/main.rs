//! qkpi-rp (Reporting) - Quality KPI reporting service
//!
//! Serves monthly quality KPIs per workshop, group and plant, compares them
//! against thresholds and accepts monthly counter entry.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;

use qkpi_common::config::{database_path, load_toml_config, resolve_root_folder};
use qkpi_common::db::init::{init_database, seed_default_thresholds};
use qkpi_common::KpiReports;
use qkpi_rp::{build_router, AppState};

const ROOT_FOLDER_ENV: &str = "QKPI_ROOT_FOLDER";

/// Command-line arguments for qkpi-rp
#[derive(Parser, Debug)]
#[command(name = "qkpi-rp")]
#[command(about = "Quality KPI reporting service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5780", env = "QKPI_RP_PORT")]
    port: u16,

    /// Folder holding the database
    #[arg(short, long, env = "QKPI_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (defaults to ~/.config/qkpi/config.toml)
    #[arg(short, long, env = "QKPI_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification first, before any database work
    info!(
        "Starting QKPI Reporting (qkpi-rp) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    info!("Root folder: {}", root_folder.display());

    let db_path = database_path(&root_folder);
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to initialize database {}", db_path.display()))?;

    if config.kpi.seed_default_thresholds {
        seed_default_thresholds(&pool)
            .await
            .context("Failed to seed default thresholds")?;
    }

    let reports = KpiReports::new(pool, &config.kpi);
    let app = build_router(AppState::new(reports));

    let host = config.bind_addr.as_deref().unwrap_or("127.0.0.1");
    let addr = format!("{}:{}", host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("qkpi-rp listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
