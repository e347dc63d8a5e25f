//! Error types for the tollgate gateway.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Gateway error types
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request-level estimate exceeds the hard per-request ceiling.
    /// Checked before any quota or cache interaction.
    #[error("Request too large: estimated {estimated} tokens exceeds the {limit}-token ceiling")]
    Validation { estimated: u64, limit: u64 },

    /// Sender's projected usage exceeds the remaining daily quota
    #[error("Daily token limit exceeded: estimated {estimated}, remaining {remaining} of {limit}")]
    RateLimitExceeded {
        limit: u64,
        estimated: u64,
        remaining: u64,
    },

    /// The wrapped backend call failed
    #[error("Backend error: {0}")]
    Upstream(String),

    /// The backend call did not complete within the configured timeout
    #[error("Backend call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Metrics persistence failed. Internal only: logged and swallowed by
    /// the metrics path, never surfaced to a caller.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            GatewayError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            GatewayError::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded")
            }
            GatewayError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            GatewayError::Http(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            GatewayError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
            GatewayError::Serialization(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let mut body = json!({
            "error": {
                "message": self.to_string(),
                "type": kind,
            }
        });

        // Callers use these fields for backoff decisions
        if let GatewayError::RateLimitExceeded {
            limit,
            estimated,
            remaining,
        } = &self
        {
            body["error"]["limit"] = json!(limit);
            body["error"]["estimated"] = json!(estimated);
            body["error"]["remaining"] = json!(remaining);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_message_carries_numbers() {
        let err = GatewayError::RateLimitExceeded {
            limit: 100_000,
            estimated: 40_000,
            remaining: 20_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("40000"));
        assert!(msg.contains("20000"));
        assert!(msg.contains("100000"));
    }

    #[test]
    fn test_validation_message() {
        let err = GatewayError::Validation {
            estimated: 501,
            limit: 500,
        };
        assert!(err.to_string().contains("501"));
    }
}
