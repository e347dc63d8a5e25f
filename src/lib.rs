//! Tollgate Library
//!
//! Cost-governed gateway for metered LLM inference backends.
//!
//! Tollgate sits between client callers and an expensive inference backend
//! and gates every call three ways: a per-sender daily token quota with
//! batch pacing, a time-bounded response cache that short-circuits repeat
//! work, and a metrics collector that tracks usage and host health.

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod admission;
pub mod backend;
pub mod cache;
pub mod error;
pub mod estimator;
pub mod gateway;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod types;

pub use error::GatewayError;
pub use gateway::Gateway;
pub use state::{AppState, GatewayConfig};

/// Build the HTTP router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(routes::health))
        .route("/ready", get(routes::ready))
        .route("/live", get(routes::live))
        .route("/metrics", get(routes::metrics))
        // Gateway endpoints
        .route("/v1/process", post(routes::process))
        .route("/v1/usage/:sender", get(routes::usage))
        .route("/v1/metrics/system", get(routes::system_metrics))
        .route("/v1/metrics/patterns", get(routes::pattern_history))
        .route("/v1/settings/batch", put(routes::update_settings))
        // Middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the tollgate server.
///
/// Blocks until the server shuts down.
///
/// # Example
/// ```no_run
/// use tollgate::{run_server, GatewayConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     run_server(GatewayConfig::from_env()).await
/// }
/// ```
pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        port = config.port,
        backend_url = %config.backend_url,
        "Starting Tollgate v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = Arc::new(AppState::new(config.clone()));

    // Check backend connectivity
    match state.backend.health_check().await {
        Ok(_) => info!("Connected to backend at {}", config.backend_url),
        Err(e) => {
            warn!(
                "Could not connect to backend at {}: {}. \
                 Gateway will start anyway and retry on requests.",
                config.backend_url, e
            );
        }
    }

    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Tollgate listening on http://{}", addr);
    info!("Process:  POST http://{}/v1/process", addr);
    info!("Usage:    GET  http://{}/v1/usage/:sender", addr);
    info!("Health:   GET  http://{}/health", addr);

    println!();
    println!("==================================================");
    println!("  Tollgate v{}", env!("CARGO_PKG_VERSION"));
    println!("==================================================");
    println!("  Listening on: http://{}", addr);
    println!("  Backend: {}", config.backend_url);
    println!();
    println!("  Admission:");
    println!("    Daily quota: {} tokens/sender", config.admission.daily_quota);
    println!(
        "    Per-request ceiling: {} tokens",
        config.admission.per_request_ceiling
    );
    println!(
        "    Batch: max {} / chunk {} / delay {}ms",
        config.batch.max_batch_size,
        config.batch.optimal_chunk_size,
        config.batch.delay.as_millis()
    );
    println!();
    println!("  Cache:");
    println!(
        "    {} entries, TTL {}s",
        config.cache.capacity,
        config.cache.ttl.as_secs()
    );
    println!();
    println!("  Metrics log: {}", config.metrics_path.display());
    println!("==================================================");
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}
