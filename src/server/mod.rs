//! HTTP surface: `takc serve`.

pub mod api;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::cache::CacheStore;
use crate::runtime::Runtime;
use api::AppState;

pub const DEFAULT_PORT: u16 = 8787;

/// How often the server sweeps expired fast-tier entries.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// Configuration for the query server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            dev_mode: false,
        }
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>, dev_mode: bool) -> Router {
    let app = api::api_router().with_state(state);
    if dev_mode {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Periodically drop expired fast-tier entries until aborted.
pub fn spawn_cache_purge(cache: CacheStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            cache.purge_expired().await;
        }
    })
}

/// Serve queries until Ctrl+C.
pub async fn start_server(config: ServerConfig, runtime: Runtime) -> Result<()> {
    let purge_task = spawn_cache_purge(runtime.cache.clone(), PURGE_INTERVAL);
    let state = Arc::new(AppState { runtime });
    let app = build_router(state, config.dev_mode);

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, dev_mode = config.dev_mode, "Server listening");
    println!("takc serving at http://{}", local_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    purge_task.abort();
    served.context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}
