//! Edge Cache - a read-through caching layer in front of an origin
//!
//! Serves cached responses with TTL freshness and coalesces concurrent
//! misses for the same key into one origin fetch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edge_cache::api::{create_router, AppState};
use edge_cache::origin::{ClockOrigin, HttpOrigin, OriginFetcher};
use edge_cache::{spawn_cleanup_task, Config};

/// Main entry point for the edge cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the origin and the cache store
/// 4. Start background expiry sweep
/// 5. Serve HTTP until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edge_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting edge cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: ttl={}s, max_entries={}, eviction={:?}, fetch_timeout={}ms, port={}",
        config.cache_ttl,
        config.max_entries,
        config.eviction_policy,
        config.fetch_timeout_ms,
        config.server_port
    );

    let origin = build_origin(&config)?;
    let state = AppState::from_config(&config, origin);

    let cleanup_handle = spawn_cleanup_task(state.cache.clone(), config.cleanup_interval);

    let app = create_router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn build_origin(config: &Config) -> anyhow::Result<Arc<dyn OriginFetcher>> {
    match &config.origin_url {
        Some(url) => {
            info!(origin = %url, "using HTTP origin");
            let origin = HttpOrigin::new(url.clone(), config.fetch_timeout())
                .context("failed to create HTTP origin")?;
            Ok(Arc::new(origin))
        }
        None => {
            info!(latency_ms = config.origin_latency_ms, "using clock origin");
            Ok(Arc::new(ClockOrigin::new(Duration::from_millis(
                config.origin_latency_ms,
            ))))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweep task.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cleanup_handle.abort();
    warn!("Expiry sweep task aborted");
}
