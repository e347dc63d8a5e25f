//! Client for the metered inference backend.
//!
//! Adapted to be deliberately thin: the gateway treats the backend call as
//! an opaque, timeout-bound unit of work. The reply payload is passed
//! through untouched; only the backend-reported token usage is lifted out
//! for quota accounting.

use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::error::GatewayError;
use crate::types::{BackendReply, Message};

/// HTTP client for the inference backend
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    /// Create a new backend client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        debug!(url = %base_url, ?timeout, "Creating backend client");
        Self {
            client: Client::new(),
            base_url,
            timeout,
        }
    }

    /// The backend base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the backend is reachable
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), GatewayError> {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(GatewayError::Upstream(format!(
                "backend returned status {}",
                response.status()
            ))),
            Err(e) => Err(GatewayError::Upstream(e.to_string())),
        }
    }

    /// Send a completion request, bounded by the configured timeout.
    ///
    /// A timed-out call yields [`GatewayError::Timeout`]; the caller treats
    /// it like any other failed work: no quota commit, no cache write.
    #[instrument(skip(self, messages), fields(messages = messages.len()))]
    pub async fn complete(&self, messages: &[Message]) -> Result<BackendReply, GatewayError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({ "messages": messages });

        let send = async {
            let response = self.client.post(&url).json(&body).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!(status = %status, "Backend returned error");
                return Err(GatewayError::Upstream(format!(
                    "backend returned status {status}: {body}"
                )));
            }

            let payload: serde_json::Value = response.json().await?;
            Ok(parse_reply(payload))
        };

        match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result,
            Err(_) => {
                error!(timeout = ?self.timeout, "Backend call timed out");
                Err(GatewayError::Timeout(self.timeout))
            }
        }
    }
}

/// Lift the metered token count out of an opaque backend payload
fn parse_reply(payload: serde_json::Value) -> BackendReply {
    let tokens_used = payload
        .get("usage")
        .and_then(|u| u.get("total_tokens"))
        .and_then(|t| t.as_u64());
    BackendReply {
        payload,
        tokens_used,
    }
}
