//! Retail KPI HTTP Server
//!
//! Serves cached inventory KPIs over HTTP.
//!
//! # Endpoints
//!
//! ## KPIs
//! - `GET /api/v1/overview` - Overview with filters in the query string
//! - `POST /api/v1/overview` - Overview with filters in a JSON body
//!
//! ## Admin
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//! - `DELETE /api/v1/cache/{section}` - Drop a cached section
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `KPI_CONFIG` environment variable (path to TOML file)
//! 2. `./kpi.toml` in current directory
//! 3. Default configuration
//!
//! # Example
//!
//! ```bash
//! KPI_CONFIG=/etc/kpi.toml ./server
//!
//! curl "http://localhost:8080/api/v1/overview?brand=Acme,Zenith&startDate=2026-01-01&endDate=2026-01-07"
//!
//! curl -X POST http://localhost:8080/api/v1/overview \
//!   -H "Content-Type: application/json" \
//!   -d '{"platform": ["Amazon"], "category": "Home", "thresholdDoh": "45"}'
//!
//! curl -X DELETE http://localhost:8080/api/v1/cache/overview
//! ```

#[path = "server/config.rs"]
mod config;
#[path = "server/handlers.rs"]
mod handlers;

use axum::{
    routing::{delete, get},
    Router,
};
use config::{load_config, ServerConfig};
use handlers::AppState;
use retail_kpi::cache::{CacheStore, InMemoryCacheStore};
use retail_kpi::config::CacheConfig;
use retail_kpi::observability::PrometheusConfig;
use retail_kpi::{InMemoryWarehouse, KpiService};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error>;

/// Build the KPI service from configuration
async fn init_service(config: &ServerConfig) -> Result<KpiService, BoxError> {
    let warehouse = match &config.warehouse.facts_path {
        Some(path) => InMemoryWarehouse::from_json_lines(path).await?,
        None => {
            warn!("No warehouse facts_path configured, serving an empty warehouse");
            InMemoryWarehouse::default()
        }
    }
    .with_timeout(config.warehouse.query_timeout());

    let store = init_cache_store(&config.cache).await?;

    let service = KpiService::builder()
        .with_warehouse(warehouse)
        .with_shared_cache_store(store)
        .with_engine_config(config.engine.clone())
        .with_cache_config(config.cache.clone())
        .build()?;

    Ok(service)
}

#[cfg(feature = "redis")]
async fn init_cache_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, BoxError> {
    use retail_kpi::cache::RedisCacheStore;

    match &config.redis_url {
        Some(url) => Ok(Arc::new(RedisCacheStore::connect(url).await?)),
        None => Ok(Arc::new(InMemoryCacheStore::new())),
    }
}

#[cfg(not(feature = "redis"))]
async fn init_cache_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, BoxError> {
    if config.redis_url.is_some() {
        warn!("redis_url is set but the server was built without the `redis` feature; using the in-process cache");
    }
    Ok(Arc::new(InMemoryCacheStore::new()))
}

/// Build the router with all endpoints
fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // API v1
        .route(
            "/api/v1/overview",
            get(handlers::overview_get).post(handlers::overview_post),
        )
        .route("/api/v1/cache/{section}", delete(handlers::invalidate_cache))
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("retail_kpi=info".parse()?)
                .add_directive("server=info".parse()?),
        )
        .init();

    info!("Retail KPI server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = load_config();
    info!("Listen address: {}", config.listen_addr);

    let service = init_service(&config).await?;
    let exporter = service.exporter(PrometheusConfig::default());

    let state = Arc::new(AppState {
        service,
        exporter,
        enable_metrics: config.enable_metrics,
    });

    let app = build_router(Arc::clone(&state));

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight cache writes land before exiting
    state.service.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
