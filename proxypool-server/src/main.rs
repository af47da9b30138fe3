//! Multi-market rotating HTTP-proxy pool service — headless daemon.
//!
//! Boots tracing, resolves `ServerSettings` from CLI/env/repository, wires
//! one `PoolInstance` per `(market, mode)`, spawns the `GlobalScheduler`,
//! and serves the `/api/v1` surface until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use proxypool_core::metrics;
use proxypool_core::repository::{InMemoryRepository, PoolRepository, SqliteRepository};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod cli;
mod error;
mod router;
mod settings;
mod state;
#[cfg(test)]
mod test_helpers;

use cli::{Cli, Commands};
use settings::ServerSettings;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or_else(default_serve_command);

    init_tracing(&command);

    let repository = build_repository(&command).await?;
    let settings = ServerSettings::load(&command, None).map_err(anyhow::Error::msg)?;

    info!(
        environment = %settings.environment,
        markets = ?settings.markets,
        "proxy-pool service starting"
    );

    metrics::init_metrics();

    let state = AppState::new(&settings, repository).await;
    let (scheduler_shutdown, scheduler_handle) = state.spawn_scheduler();

    let app = router::build_router(state);
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .context("failed to parse HOST:PORT into a socket address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    let _ = scheduler_shutdown.send(true);
    if tokio::time::timeout(Duration::from_secs(10), scheduler_handle).await.is_err() {
        warn!("global scheduler did not stop within the shutdown grace period");
    }

    info!("proxy-pool service stopped");
    Ok(())
}

fn default_serve_command() -> Commands {
    Commands::Serve {
        environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        markets: std::env::var("MARKETS").unwrap_or_else(|_| "CN".to_string()),
        host: std::env::var("HOST").ok(),
        port: std::env::var("PORT").ok().and_then(|p| p.parse().ok()),
        log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        database_url: std::env::var("DATABASE_URL").ok(),
    }
}

fn init_tracing(command: &Commands) {
    let Commands::Serve { log_level, .. } = command;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).with_target(false).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already initialized (e.g. repeated calls in tests); not fatal.
    }
}

/// `sqlx`-backed repository when `DATABASE_URL` is set, else the in-memory
/// reference implementation (spec.md §6 "Environment").
async fn build_repository(command: &Commands) -> Result<Arc<dyn PoolRepository>> {
    let Commands::Serve { database_url, .. } = command;
    match database_url {
        Some(url) => {
            let repo = SqliteRepository::connect(url)
                .await
                .map_err(|e| anyhow::anyhow!("failed to connect to DATABASE_URL: {e}"))?;
            Ok(Arc::new(repo))
        },
        None => Ok(Arc::new(InMemoryRepository::new())),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
