//! Server initialization and main run loop

use super::config::AppConfig;
use super::providers::build_gateway;
use crate::api::api_router;
use anyhow::{Context, Result};
use axum::Extension;
use bastion_core::{
    KvStore, MemoryStore, MetricsCollector, Orchestrator, RedisStore, SharedStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Interval between expired-entry sweeps of the in-memory store
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Open the configured store and verify it answers
pub async fn init_store(config: &AppConfig) -> Result<(SharedStore, Option<Arc<MemoryStore>>)> {
    if config.redis.use_memory {
        warn!("Using in-memory store; state is lost on restart");
        let memory = Arc::new(MemoryStore::new());
        let store: SharedStore = memory.clone();
        return Ok((store, Some(memory)));
    }

    let redis = RedisStore::new(&config.redis.url).context("Invalid Redis URL")?;
    redis
        .ping()
        .await
        .with_context(|| format!("Redis at {} is unreachable", config.redis.url))?;
    info!("Connected to Redis");
    let store: SharedStore = Arc::new(redis);
    Ok((store, None))
}

/// Wire store, metrics, gateway and facade together
pub fn build_orchestrator(
    config: &AppConfig,
    store: SharedStore,
) -> Result<Arc<Orchestrator>> {
    let metrics = Arc::new(MetricsCollector::new(store.clone(), config.metrics));
    let gateway = build_gateway(config, metrics.clone())?;

    let orchestrator = Orchestrator::builder()
        .store(store)
        .gateway(Arc::new(gateway))
        .metrics(metrics)
        .router_config(config.router.clone())
        .safety_config(config.safety.clone())
        .token_budget(config.token_budget)
        .cache_config(config.cache)
        .checkpoint_config(config.checkpoint)
        .config(config.orchestrator.clone())
        .build()
        .context("Failed to build orchestrator")?;

    Ok(Arc::new(orchestrator))
}

/// Periodically drop expired entries from the in-memory store
fn start_purge_task(memory: Arc<MemoryStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MEMORY_PURGE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = memory.purge_expired().await;
            if purged > 0 {
                info!(purged, "Purged expired entries");
            }
        }
    })
}

/// Run the server
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Bastion v{}", env!("CARGO_PKG_VERSION"));

    let (store, memory) = init_store(&config).await?;
    let purge_task = memory.map(start_purge_task);

    let orchestrator = build_orchestrator(&config, store)?;
    info!(
        providers = orchestrator.gateway().descriptors().len(),
        "Orchestrator ready"
    );

    let app = api_router()
        .layer(Extension(orchestrator.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("HTTP server error")?;

    if let Some(task) = purge_task {
        task.abort();
    }
    if let Err(e) = orchestrator.shutdown().await {
        warn!(error = %e, "Store did not close cleanly");
    }

    info!("Bastion shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn wait_for_shutdown_signal() {
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
