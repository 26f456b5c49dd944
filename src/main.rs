//! Stick Fight - two-fighter stick combat
//!
//! One binary, three run modes selected by `GAME_MODE`:
//! - `local`: offline fight against a simple opponent
//! - `server`: authoritative rooms over WebSocket
//! - `client`: networked client rendering server snapshots

mod app;
mod config;
mod game;
mod http;
mod input;
mod local;
mod net;
mod render;
mod room;
mod util;
mod ws;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::{Config, Mode};
use crate::game::physics::Arena;
use crate::http::build_router;
use crate::input::spawn_stdin_reader;
use crate::local::LocalSession;
use crate::render::LogRenderer;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    match config.mode {
        Mode::Server => run_server(config).await,
        Mode::Local => run_local(config).await,
        Mode::Client => run_client(config).await,
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    init_server_time();

    info!("Starting Stick Fight room server");
    info!("Server address: {}", config.server_addr);

    let addr = config.server_addr;
    let router = build_router(AppState::new(config));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn run_local(config: Config) -> anyhow::Result<()> {
    info!(player = %config.player_name, "Starting local fight");

    let (input, reader) = spawn_stdin_reader();
    let session = LocalSession::new(
        &config.player_name,
        Arena::new(config.arena_half_width),
        LogRenderer::new(),
    );
    session.run(input, shutdown_signal()).await;
    reader.abort();

    Ok(())
}

async fn run_client(config: Config) -> anyhow::Result<()> {
    info!(url = %config.server_url, room = ?config.room, "Starting networked client");

    let (input, reader) = spawn_stdin_reader();
    let result = net::client::run(&config, input, LogRenderer::new(), shutdown_signal()).await;
    reader.abort();

    if let Err(e) = &result {
        error!(error = %e, "Client session failed");
    }
    result.map_err(Into::into)
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
