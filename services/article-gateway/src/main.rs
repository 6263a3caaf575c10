// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Article Gateway Service
//!
//! ## Configuration
//!
//! The first argument names a config file (default `gateway.toml`, optional).
//! Environment variables prefixed `GATEWAY__` override it, for example:
//!
//! - `GATEWAY__BIND_ADDR`: Server bind address (default: 0.0.0.0:7451)
//! - `GATEWAY__DATABASE__ENDPOINT`: Store endpoint (default: ws://127.0.0.1:8000)
//! - `GATEWAY__RATE_LIMIT__RATE_PER_SEC` / `__BURST`: Global bucket (default: 2/s, 5)
//! - `GATEWAY__RATE_LIMIT__COOLDOWN_SECS`: Per-source cool-down (default: 10)
//! - `GATEWAY__DELIVERY__MAX_LIMIT`: Maximum rows per query (default: 100)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use article_gateway::{
    config::Config,
    db::Database,
    handlers::{app, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("gateway.toml"));
    let config = Config::load(Some(config_path.as_path()))?;
    info!(
        bind_addr = %config.bind_addr,
        rate_per_sec = config.rate_limit.rate_per_sec,
        burst = config.rate_limit.burst,
        cooldown_secs = config.rate_limit.cooldown_secs,
        max_limit = config.delivery.max_limit,
        "Starting article gateway"
    );

    let db = Database::connect(&config.database).await?;
    let state = Arc::new(AppState::new(config.clone(), db.clone())?);
    state.gateway.reload(&db).await?;

    let reload = Arc::clone(&state.gateway)
        .spawn_reload(db.clone(), config.accounts.reload_interval());

    // Spawn cleanup task
    let cleanup_state = Arc::clone(&state);
    let cleanup = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_state.limiter.cleanup().await;
        }
    });

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app(Arc::clone(&state)).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    reload.abort();
    cleanup.abort();

    if let Err(e) = state.gateway.flush(&db).await {
        warn!(error = %e, detail = e.detail(), "Final usage flush failed");
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
