//! Ragdoll Arena Server - Authoritative multiplayer ragdoll brawler
//!
//! This is the main entry point for the arena server. It handles:
//! - WebSocket connections for real-time play and spectating
//! - The single arena task that owns the physics world and round state
//! - Static hosting of the browser client and the Twitch overlay

mod app;
mod config;
mod game;
mod http;
mod identity;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::rapier::RapierWorld;
use crate::game::ArenaTask;
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

    info!("Starting Ragdoll Arena Server");
    info!("Server address: {}", config.server_addr);
    if config.twitch_client_id.is_none() {
        warn!("TWITCH_CLIENT_ID not set, Twitch login disabled");
    }

    // Spawn the arena
    let seed = config.arena_seed.unwrap_or_else(rand::random);
    info!(seed, min_players = config.tuning.min_players, "Arena configured");
    let (arena, handle) = ArenaTask::new(RapierWorld::new(), config.tuning, seed);
    tokio::spawn(arena.run());

    // Build router
    let addr: SocketAddr = config.server_addr;
    let router = build_router(AppState::new(config, handle)?);

    // Start server
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
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

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
