//! Health check and metrics endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

/// Health check endpoint
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.backend.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "backend": "connected",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "backend": "disconnected",
                "error": e.to_string(),
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
    }
}

/// Metrics endpoint with gateway, admission, and cache statistics
///
/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.stats.lock().await;
    let cache_stats = state.gateway.cache().stats().await;
    let settings = state.gateway.admission().settings();
    let collector = state.gateway.metrics();

    Json(json!({
        "gateway": {
            "requests_total": stats.requests_total,
            "requests_success": stats.requests_success,
            "requests_rejected": stats.requests_rejected,
            "requests_failed": stats.requests_failed,
            "success_rate": stats.success_rate(),
            "error_rate": collector.error_rate()
        },
        "admission": {
            "daily_quota": state.gateway.admission().daily_quota(),
            "per_request_ceiling": state.gateway.admission().per_request_ceiling(),
            "batch": {
                "max_batch_size": settings.max_batch_size,
                "optimal_chunk_size": settings.optimal_chunk_size,
                "delay_ms": settings.delay.as_millis() as u64
            }
        },
        "cache": {
            "config": {
                "capacity": state.gateway.cache().config().capacity,
                "ttl_secs": state.gateway.cache().config().ttl.as_secs()
            },
            "hits": cache_stats.hits,
            "misses": cache_stats.misses,
            "puts": cache_stats.puts,
            "expirations": cache_stats.expirations,
            "entries": cache_stats.entries,
            "hit_rate": cache_stats.hit_rate
        }
    }))
}

/// Ready check (for orchestrators)
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.backend.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Live check
///
/// GET /live
pub async fn live() -> impl IntoResponse {
    StatusCode::OK
}
