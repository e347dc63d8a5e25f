//! Success/error recording, bounded event history, and system snapshots.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

use crate::types::SystemSnapshot;

use super::store::MetricsStore;
use super::system::SystemSampler;

/// Retained events per endpoint; oldest-first eviction when full
pub const HISTORY_CAP: usize = 1000;

/// Retained pattern events across all endpoints
const PATTERN_HISTORY_CAP: usize = 1000;

/// Window applied when a timeframe string is unrecognized
const DEFAULT_TIMEFRAME: Duration = Duration::from_secs(24 * 3600);

/// One recorded request, append-only
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricEvent {
    pub endpoint: String,
    pub tokens: u64,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One pattern occurrence in the recency index
#[derive(Debug, Clone, serde::Serialize)]
pub struct PatternEvent {
    pub pattern: String,
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
}

/// Measurements taken by the caller around one request
#[derive(Debug, Clone)]
pub struct RequestSample {
    /// When handling of the request began; latency derives from this
    pub started_at: Instant,
    /// Tokens the request consumed
    pub tokens: u64,
    /// Optional classification tag for trend analysis
    pub pattern: Option<String>,
}

impl RequestSample {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            tokens: 0,
            pattern: None,
        }
    }

    pub fn tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn pattern(mut self, pattern: Option<String>) -> Self {
        self.pattern = pattern;
        self
    }
}

/// Per-endpoint counters and bounded history
#[derive(Default)]
struct EndpointStats {
    requests: AtomicU64,
    errors: AtomicU64,
    history: Mutex<VecDeque<MetricEvent>>,
}

/// Records gateway activity and samples host health.
///
/// Counters update with simple atomic increments; no cross-endpoint
/// ordering is guaranteed or needed. The collector lives for the process
/// lifetime with no terminal state.
pub struct MetricsCollector {
    endpoints: DashMap<String, Arc<EndpointStats>>,
    pattern_history: Mutex<VecDeque<PatternEvent>>,
    store: Arc<dyn MetricsStore>,
    sampler: std::sync::Mutex<SystemSampler>,
}

impl MetricsCollector {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self {
            endpoints: DashMap::new(),
            pattern_history: Mutex::new(VecDeque::new()),
            store,
            sampler: std::sync::Mutex::new(SystemSampler::new()),
        }
    }

    fn endpoint(&self, name: &str) -> Arc<EndpointStats> {
        self.endpoints
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Record a completed request.
    ///
    /// Increments the endpoint's request counter, appends to its bounded
    /// history, updates the pattern index, and best-effort persists the
    /// event. A persistence failure is logged and swallowed; it never fails
    /// the caller's request.
    pub async fn record_success(&self, endpoint: &str, sample: RequestSample) {
        let stats = self.endpoint(endpoint);
        stats.requests.fetch_add(1, Ordering::Relaxed);

        let event = MetricEvent {
            endpoint: endpoint.to_string(),
            tokens: sample.tokens,
            latency_ms: sample.started_at.elapsed().as_millis() as u64,
            pattern: sample.pattern.clone(),
            timestamp: Utc::now(),
        };

        {
            let mut history = stats.history.lock().await;
            if history.len() == HISTORY_CAP {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        if let Some(pattern) = sample.pattern {
            let mut patterns = self.pattern_history.lock().await;
            if patterns.len() == PATTERN_HISTORY_CAP {
                patterns.pop_front();
            }
            patterns.push_back(PatternEvent {
                pattern,
                endpoint: endpoint.to_string(),
                timestamp: event.timestamp,
            });
        }

        if let Err(e) = self.store.append(&event).await {
            warn!(endpoint, error = %e, "Failed to persist metric event");
        }
    }

    /// Record a failed request. Counter only; the error body is not kept.
    pub fn record_error(&self, endpoint: &str) {
        self.endpoint(endpoint)
            .errors
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Total errors / total requests across every endpoint observed since
    /// process start, 0.0 when no requests have occurred
    pub fn error_rate(&self) -> f64 {
        let mut requests = 0u64;
        let mut errors = 0u64;
        for entry in self.endpoints.iter() {
            requests += entry.requests.load(Ordering::Relaxed);
            errors += entry.errors.load(Ordering::Relaxed);
        }
        if requests == 0 {
            0.0
        } else {
            errors as f64 / requests as f64
        }
    }

    /// Requests recorded for one endpoint
    pub fn request_count(&self, endpoint: &str) -> u64 {
        self.endpoints
            .get(endpoint)
            .map(|s| s.requests.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Errors recorded for one endpoint
    pub fn error_count(&self, endpoint: &str) -> u64 {
        self.endpoints
            .get(endpoint)
            .map(|s| s.errors.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Retained event history for one endpoint, oldest first
    pub async fn history(&self, endpoint: &str) -> Vec<MetricEvent> {
        // Drop the map guard before awaiting the history lock so a busy
        // endpoint cannot pin its shard against concurrent inserts.
        let stats = self.endpoints.get(endpoint).map(|s| s.clone());
        match stats {
            Some(stats) => stats.history.lock().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Pattern events within `now - window(timeframe)`, oldest first.
    ///
    /// `timeframe` is a small grammar: `"30m"`, `"24h"`, `"7d"`. An
    /// unrecognized value falls back to 24 hours.
    pub async fn pattern_history(&self, timeframe: &str) -> Vec<PatternEvent> {
        let window = parse_timeframe(timeframe);
        let cutoff = Utc::now()
            - ChronoDuration::from_std(window).unwrap_or_else(|_| ChronoDuration::hours(24));

        let patterns = self.pattern_history.lock().await;
        patterns
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Sample host memory and CPU and derive the process error rate
    pub fn system_snapshot(&self) -> SystemSnapshot {
        let (memory_used_pct, cpu_used_pct) = {
            let mut sampler = self.sampler.lock().unwrap_or_else(|e| e.into_inner());
            (sampler.memory_used_pct(), sampler.cpu_used_pct())
        };
        SystemSnapshot {
            memory_used_pct,
            cpu_used_pct,
            error_rate: self.error_rate(),
            timestamp: Utc::now(),
        }
    }
}

/// Parse the timeframe grammar into a window, defaulting to 24 h
fn parse_timeframe(timeframe: &str) -> Duration {
    let timeframe = timeframe.trim();
    let Some(unit) = timeframe.chars().last() else {
        return DEFAULT_TIMEFRAME;
    };
    let number = &timeframe[..timeframe.len() - unit.len_utf8()];

    let Ok(n) = number.parse::<u64>() else {
        return DEFAULT_TIMEFRAME;
    };
    match unit {
        'm' => Duration::from_secs(n * 60),
        'h' => Duration::from_secs(n * 3600),
        'd' => Duration::from_secs(n * 24 * 3600),
        _ => DEFAULT_TIMEFRAME,
    }
}
