//! Wire types shared between the gateway core and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message in an inference request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Message role ("user", "assistant", "system")
    pub role: String,
    /// Message text content
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// What the backend call returns to the gateway: an opaque payload plus the
/// token usage the backend metered for the call, when it reports one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendReply {
    /// Opaque response payload, passed through to the caller
    pub payload: serde_json::Value,
    /// Actual tokens consumed as reported by the backend. The admission
    /// controller falls back to the pre-call estimate when absent.
    pub tokens_used: Option<u64>,
}

/// Request body for POST /v1/process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    /// Opaque caller identity used as the quota-accounting key
    pub sender: String,
    /// Message sequence to send to the backend
    pub messages: Vec<Message>,
    /// Optional classification tag recorded with the success metric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Response body for GET /v1/usage/:sender
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageResponse {
    pub sender: String,
    pub daily_usage: u64,
    pub remaining_tokens: u64,
}

/// Request body for PUT /v1/settings/batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettingsBody {
    pub max_batch_size: usize,
    pub optimal_chunk_size: usize,
    pub delay_ms: u64,
}

impl From<BatchSettingsBody> for crate::admission::BatchSettings {
    fn from(body: BatchSettingsBody) -> Self {
        Self {
            max_batch_size: body.max_batch_size,
            optimal_chunk_size: body.optimal_chunk_size,
            delay: std::time::Duration::from_millis(body.delay_ms),
        }
    }
}

/// Derived host/process health snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Memory in use as a percentage of total
    pub memory_used_pct: f64,
    /// CPU busy share over the interval since the previous sample
    pub cpu_used_pct: f64,
    /// Total errors / total requests across all endpoints, 0 when idle
    pub error_rate: f64,
    pub timestamp: DateTime<Utc>,
}
