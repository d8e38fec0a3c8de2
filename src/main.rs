//! Arena Round Server - headless round-based arena matches
//!
//! This is the main entry point for the server. It handles:
//! - Running match sessions back to back in a headless arena
//! - WebSocket feed of the message and score panels for spectators
//! - HTTP endpoints for health and the current match status

mod app;
mod config;
mod game;
mod http;
mod session;
mod sim;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Arena Round Server");
    info!("Server address: {}", config.server_addr);
    info!(
        players = config.match_settings.roster.len(),
        win_threshold = config.match_settings.win_threshold,
        "Match rules loaded"
    );

    // Create application state
    let state = AppState::new(config.clone());

    // Spawn session runner
    let sessions = state.sessions.clone();
    let session_task = tokio::spawn(async move {
        match sessions.run().await {
            Ok(()) => info!("Session runner finished"),
            Err(e) => error!(error = %e, "Session runner stopped"),
        }
    });

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(session_task))
        .await?;

    info!("Server shutdown complete");
    Ok(())
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

/// Graceful shutdown on a signal or once the session runner is done
async fn shutdown_signal(session_task: tokio::task::JoinHandle<()>) {
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
        result = session_task => {
            if let Err(e) = result {
                error!(error = %e, "Session runner panicked");
            }
            info!("No more sessions to run, starting graceful shutdown");
        }
    }
}
