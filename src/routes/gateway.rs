//! Core gateway routes: processing, usage, metrics queries, settings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::error::GatewayError;
use crate::state::AppState;
use crate::types::{BatchSettingsBody, ProcessRequest};

/// Process a request through the gateway
///
/// POST /v1/process
pub async fn process(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    info!(
        sender = %request.sender,
        messages = request.messages.len(),
        "Handling POST /v1/process"
    );

    {
        let mut stats = state.stats.lock().await;
        stats.requests_total += 1;
    }

    let backend = state.backend.clone();
    let messages = request.messages.clone();
    let result = state
        .gateway
        .process(&request.sender, &request.messages, request.pattern, move || async move {
            backend.complete(&messages).await
        })
        .await;

    let mut stats = state.stats.lock().await;
    match &result {
        Ok(_) => stats.requests_success += 1,
        Err(GatewayError::Validation { .. }) | Err(GatewayError::RateLimitExceeded { .. }) => {
            stats.requests_rejected += 1
        }
        Err(_) => stats.requests_failed += 1,
    }

    result.map(Json)
}

/// Quota standing for a sender
///
/// GET /v1/usage/:sender
pub async fn usage(
    State(state): State<Arc<AppState>>,
    Path(sender): Path<String>,
) -> impl IntoResponse {
    Json(state.gateway.usage(&sender).await)
}

/// Host and process health snapshot
///
/// GET /v1/metrics/system
pub async fn system_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.gateway.system_metrics())
}

#[derive(Debug, Deserialize)]
pub struct PatternQuery {
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
}

fn default_timeframe() -> String {
    "24h".to_string()
}

/// Pattern events within a recency window
///
/// GET /v1/metrics/patterns?timeframe=24h
pub async fn pattern_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PatternQuery>,
) -> impl IntoResponse {
    Json(state.gateway.pattern_history(&query.timeframe).await)
}

/// Replace the live batch settings
///
/// PUT /v1/settings/batch
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchSettingsBody>,
) -> impl IntoResponse {
    info!(?body, "Handling PUT /v1/settings/batch");
    state.gateway.update_settings(body.into());
    StatusCode::NO_CONTENT
}
