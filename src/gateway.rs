//! Request orchestration: estimate, cache, admission, metrics.
//!
//! The gateway holds no logic of its own beyond ordering and error
//! translation. Each call runs estimate → per-request ceiling check → cache
//! lookup → admission-gated backend call → metrics recording → cache store.
//! A cache hit is a full short-circuit: it bypasses both the quota check
//! and the backend call, not merely the response body.

use std::future::Future;
use tracing::{debug, info};

use crate::admission::{AdmissionController, BatchSettings};
use crate::cache::ResponseCache;
use crate::error::GatewayError;
use crate::estimator;
use crate::metrics::{MetricsCollector, PatternEvent, RequestSample};
use crate::types::{BackendReply, Message, SystemSnapshot, UsageResponse};

/// Metric endpoint name for the main processing flow
const PROCESS_ENDPOINT: &str = "process";

/// Sequences the admission/cache/metrics triad for every request.
///
/// Constructed once at process start and shared by reference; there are no
/// global singletons, so tests get isolation from fresh instances.
pub struct Gateway {
    admission: AdmissionController,
    cache: ResponseCache,
    metrics: MetricsCollector,
}

impl Gateway {
    pub fn new(
        admission: AdmissionController,
        cache: ResponseCache,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            admission,
            cache,
            metrics,
        }
    }

    /// Process one request for `sender`.
    ///
    /// `work` is the actual backend call, supplied by the transport layer.
    /// It is only invoked on a cache miss that passes admission, and a
    /// failed or timed-out call is surfaced unchanged: not cached, not
    /// charged against the quota, recorded as an error metric.
    pub async fn process<F, Fut>(
        &self,
        sender: &str,
        messages: &[Message],
        pattern: Option<String>,
        work: F,
    ) -> Result<serde_json::Value, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BackendReply, GatewayError>>,
    {
        let sample = RequestSample::start();
        let estimated = estimator::estimate_messages(messages);

        // Hard per-request ceiling, checked before any quota or cache
        // interaction
        let ceiling = self.admission.per_request_ceiling();
        if estimated > ceiling {
            debug!(sender, estimated, ceiling, "Rejecting oversized request");
            return Err(GatewayError::Validation {
                estimated,
                limit: ceiling,
            });
        }

        if let Some(payload) = self.cache.get(messages).await {
            info!(sender, estimated, "Served from cache");
            self.metrics
                .record_success(PROCESS_ENDPOINT, sample.tokens(0).pattern(pattern))
                .await;
            return Ok(payload);
        }

        let result = self
            .admission
            .handle_request(sender, estimated, work)
            .await;

        match result {
            Ok(reply) => {
                let actual = reply.tokens_used.unwrap_or(estimated);
                self.metrics
                    .record_success(PROCESS_ENDPOINT, sample.tokens(actual).pattern(pattern))
                    .await;
                self.cache.put(messages, reply.payload.clone()).await;
                info!(sender, tokens = actual, "Request complete");
                Ok(reply.payload)
            }
            Err(e) => {
                // Only failures of the backend call itself count as error
                // metrics; admission rejections never reached the backend.
                if matches!(
                    e,
                    GatewayError::Upstream(_) | GatewayError::Timeout(_) | GatewayError::Http(_)
                ) {
                    self.metrics.record_error(PROCESS_ENDPOINT);
                }
                Err(e)
            }
        }
    }

    /// Current quota standing for a sender
    pub async fn usage(&self, sender: &str) -> UsageResponse {
        UsageResponse {
            sender: sender.to_string(),
            daily_usage: self.admission.daily_usage(sender).await,
            remaining_tokens: self.admission.remaining_tokens(sender).await,
        }
    }

    /// Host and process health snapshot
    pub fn system_metrics(&self) -> SystemSnapshot {
        self.metrics.system_snapshot()
    }

    /// Pattern events within the given recency window
    pub async fn pattern_history(&self, timeframe: &str) -> Vec<PatternEvent> {
        self.metrics.pattern_history(timeframe).await
    }

    /// Atomically replace the live batch settings
    pub fn update_settings(&self, settings: BatchSettings) {
        self.admission.update_settings(settings);
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}
