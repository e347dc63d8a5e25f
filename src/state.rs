//! Application state for the tollgate gateway.
//!
//! One context object constructed at process start and passed by reference
//! to every handler. Nothing in the crate is a global singleton, so tests
//! build fresh state per test.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::admission::{AdmissionConfig, AdmissionController, BatchSettings};
use crate::backend::BackendClient;
use crate::cache::{CacheConfig, ResponseCache};
use crate::gateway::Gateway;
use crate::metrics::{JsonlStore, MetricsCollector};

/// Top-level gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on
    pub port: u16,

    /// Inference backend base URL
    pub backend_url: String,

    /// Per-call timeout for backend requests
    pub request_timeout: Duration,

    /// Where metric events are appended as line-delimited JSON
    pub metrics_path: PathBuf,

    /// Quota configuration
    pub admission: AdmissionConfig,

    /// Initial batch pacing settings
    pub batch: BatchSettings,

    /// Response cache configuration
    pub cache: CacheConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            backend_url: "http://localhost:11434".to_string(),
            request_timeout: Duration::from_secs(120),
            metrics_path: PathBuf::from("tollgate-metrics.jsonl"),
            admission: AdmissionConfig::default(),
            batch: BatchSettings::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self {
            admission: AdmissionConfig::from_env(),
            batch: BatchSettings::from_env(),
            cache: CacheConfig::from_env(),
            ..Self::default()
        };

        if let Ok(val) = std::env::var("TOLLGATE_PORT") {
            if let Ok(n) = val.parse() {
                config.port = n;
            }
        }

        if let Ok(val) = std::env::var("TOLLGATE_BACKEND_URL") {
            config.backend_url = val;
        }

        if let Ok(val) = std::env::var("TOLLGATE_REQUEST_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                config.request_timeout = Duration::from_secs(n);
            }
        }

        if let Ok(val) = std::env::var("TOLLGATE_METRICS_PATH") {
            config.metrics_path = PathBuf::from(val);
        }

        config
    }
}

/// Runtime statistics for the transport layer
#[derive(Debug, Default)]
pub struct GatewayStats {
    /// Total requests received
    pub requests_total: u64,

    /// Requests answered successfully (cached or upstream)
    pub requests_success: u64,

    /// Requests rejected by validation or quota
    pub requests_rejected: u64,

    /// Requests that failed at the backend
    pub requests_failed: u64,
}

impl GatewayStats {
    /// Share of received requests answered successfully
    pub fn success_rate(&self) -> f64 {
        if self.requests_total == 0 {
            1.0
        } else {
            self.requests_success as f64 / self.requests_total as f64
        }
    }
}

/// Application state shared across all handlers
pub struct AppState {
    /// Core orchestrator: admission, cache, metrics
    pub gateway: Gateway,

    /// Inference backend client
    pub backend: BackendClient,

    /// Transport-level statistics
    pub stats: Mutex<GatewayStats>,

    /// Configuration
    pub config: GatewayConfig,
}

impl AppState {
    /// Create new application state
    pub fn new(config: GatewayConfig) -> Self {
        let gateway = Gateway::new(
            AdmissionController::new(config.admission.clone(), config.batch.clone()),
            ResponseCache::new(config.cache.clone()),
            MetricsCollector::new(Arc::new(JsonlStore::new(&config.metrics_path))),
        );
        Self {
            gateway,
            backend: BackendClient::new(&config.backend_url, config.request_timeout),
            stats: Mutex::new(GatewayStats::default()),
            config,
        }
    }
}
