//! Admission control for the metered backend.
//!
//! The controller enforces a per-sender daily token quota and paces batch
//! dispatch. Admission is the accept/reject decision made before the
//! expensive backend call is attempted: a request whose estimated cost
//! exceeds the sender's remaining daily tokens is rejected without the
//! backend ever being invoked. Admitted work commits the backend-reported
//! actual usage (the estimate as fallback) on success and commits nothing
//! on failure.
//!
//! The read-check-commit sequence for a sender is serialized by holding
//! that sender's ledger lock across the check, the backend call, and the
//! commit. A naive read-then-write would let two concurrent requests both
//! observe enough remaining quota and jointly overshoot it.

mod config;
mod quota;

pub use config::{AdmissionConfig, BatchSettings};
pub use quota::QuotaLedger;

use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::types::BackendReply;

/// A boxed backend call, used where a batch mixes closures of different
/// concrete types
pub type BoxedWork =
    Pin<Box<dyn Future<Output = Result<BackendReply, GatewayError>> + Send>>;

/// One work item in a batch: projected cost plus the call itself
pub struct BatchItem {
    pub estimated: u64,
    pub work: BoxedWork,
}

impl BatchItem {
    pub fn new(
        estimated: u64,
        work: impl Future<Output = Result<BackendReply, GatewayError>> + Send + 'static,
    ) -> Self {
        Self {
            estimated,
            work: Box::pin(work),
        }
    }
}

/// Enforces the per-sender daily quota and batch pacing around backend calls
pub struct AdmissionController {
    config: AdmissionConfig,
    settings: RwLock<BatchSettings>,
    ledger: QuotaLedger,
}

impl AdmissionController {
    /// Create a controller with the given quota config and batch settings
    pub fn new(config: AdmissionConfig, settings: BatchSettings) -> Self {
        Self {
            config,
            settings: RwLock::new(settings),
            ledger: QuotaLedger::new(),
        }
    }

    /// The configured daily quota in tokens
    pub fn daily_quota(&self) -> u64 {
        self.config.daily_quota
    }

    /// Hard ceiling on a single request's estimated tokens
    pub fn per_request_ceiling(&self) -> u64 {
        self.config.per_request_ceiling
    }

    /// Snapshot of the live batch settings
    pub fn settings(&self) -> BatchSettings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Atomically replace the batch settings.
    ///
    /// Affects only requests admitted after the update; in-flight batches
    /// keep the snapshot they took at admission.
    pub fn update_settings(&self, settings: BatchSettings) {
        debug!(?settings, "Updating batch settings");
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    /// Tokens the sender has committed today
    pub async fn daily_usage(&self, sender: &str) -> u64 {
        self.ledger.used_on(sender, today()).await
    }

    /// Tokens the sender may still spend today, floored at 0
    pub async fn remaining_tokens(&self, sender: &str) -> u64 {
        self.config
            .daily_quota
            .saturating_sub(self.daily_usage(sender).await)
    }

    /// Admit and execute a single backend call for `sender`.
    pub async fn handle_request<F, Fut>(
        &self,
        sender: &str,
        estimated: u64,
        work: F,
    ) -> Result<BackendReply, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BackendReply, GatewayError>>,
    {
        self.handle_request_on(today(), sender, estimated, work)
            .await
    }

    /// Day-parameterized form of [`handle_request`](Self::handle_request)
    pub(crate) async fn handle_request_on<F, Fut>(
        &self,
        day: NaiveDate,
        sender: &str,
        estimated: u64,
        work: F,
    ) -> Result<BackendReply, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BackendReply, GatewayError>>,
    {
        let cell = self.ledger.cell(sender, day);
        // Sender-scoped critical section: held across check, call, commit
        let mut usage = cell.lock().await;
        usage.roll_to(day);

        let used = usage.used_on(day);
        let remaining = self.config.daily_quota.saturating_sub(used);
        if estimated > remaining {
            warn!(
                sender,
                estimated, remaining, "Rejecting request over daily quota"
            );
            return Err(GatewayError::RateLimitExceeded {
                limit: self.config.daily_quota,
                estimated,
                remaining,
            });
        }

        let reply = work().await?;

        // The backend's metered count is authoritative; an actual above the
        // estimate may push this one request past the quota, blocking only
        // subsequent requests.
        let actual = reply.tokens_used.unwrap_or(estimated);
        usage.commit(actual);
        debug!(sender, actual, used = used + actual, "Committed token usage");

        Ok(reply)
    }

    /// Admit a batch of work items on their summed estimate, then dispatch
    /// them in paced chunks.
    ///
    /// Pacing is a throughput-shaping knob, not an admission decision: when
    /// the batch is larger than one chunk and a non-zero delay is
    /// configured, the delay is slept between chunks, and no item is ever
    /// rejected by pacing. Per-item failures are returned in place and
    /// commit nothing; successful items commit their actual usage.
    pub async fn handle_batch(
        &self,
        sender: &str,
        items: Vec<BatchItem>,
    ) -> Result<Vec<Result<BackendReply, GatewayError>>, GatewayError> {
        self.handle_batch_on(today(), sender, items).await
    }

    /// Day-parameterized form of [`handle_batch`](Self::handle_batch)
    pub(crate) async fn handle_batch_on(
        &self,
        day: NaiveDate,
        sender: &str,
        items: Vec<BatchItem>,
    ) -> Result<Vec<Result<BackendReply, GatewayError>>, GatewayError> {
        let settings = self.settings();
        let chunk_size = settings.chunk_size();
        let total_estimate: u64 = items.iter().map(|i| i.estimated).sum();

        let cell = self.ledger.cell(sender, day);
        let mut usage = cell.lock().await;
        usage.roll_to(day);

        let remaining = self.config.daily_quota.saturating_sub(usage.used_on(day));
        if total_estimate > remaining {
            warn!(
                sender,
                total_estimate, remaining, "Rejecting batch over daily quota"
            );
            return Err(GatewayError::RateLimitExceeded {
                limit: self.config.daily_quota,
                estimated: total_estimate,
                remaining,
            });
        }

        let pace = items.len() > chunk_size && !settings.delay.is_zero();
        let mut results = Vec::with_capacity(items.len());
        let mut dispatched = 0usize;

        for item in items {
            if pace && dispatched > 0 && dispatched % chunk_size == 0 {
                debug!(sender, dispatched, "Pacing batch dispatch");
                tokio::time::sleep(settings.delay).await;
            }
            dispatched += 1;

            match item.work.await {
                Ok(reply) => {
                    usage.commit(reply.tokens_used.unwrap_or(item.estimated));
                    results.push(Ok(reply));
                }
                Err(e) => results.push(Err(e)),
            }
        }

        Ok(results)
    }
}

/// Current UTC calendar day, the quota-accounting key
fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
