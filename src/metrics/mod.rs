//! Observability for the gateway.
//!
//! The collector keeps per-endpoint success/error counters, a bounded
//! per-endpoint event history, and a pattern index for trend queries, and
//! derives system snapshots from host counters. Events are persisted
//! best-effort through a pluggable [`MetricsStore`].

mod collector;
mod store;
mod system;

pub use collector::{
    MetricEvent, MetricsCollector, PatternEvent, RequestSample, HISTORY_CAP,
};
pub use store::{InMemoryStore, JsonlStore, MetricsStore};
pub use system::SystemSampler;
