//! Durable storage for metric events.
//!
//! Persistence is best-effort: the collector logs and swallows append
//! failures so a broken disk never fails a caller's request. The store is a
//! collaborator behind a trait so the core does not care whether events land
//! in a file, a database, or memory.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::error::GatewayError;

use super::MetricEvent;

/// Append-only sink for metric events
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Append one event. Failure is reported, never retried.
    async fn append(&self, event: &MetricEvent) -> Result<(), GatewayError>;
}

/// Line-delimited JSON file store
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl MetricsStore for JsonlStore {
    async fn append(&self, event: &MetricEvent) -> Result<(), GatewayError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| GatewayError::Persistence(e.to_string()))?;
        file.write_all(&line)
            .await
            .map_err(|e| GatewayError::Persistence(e.to_string()))?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral deployments
#[derive(Default)]
pub struct InMemoryStore {
    events: tokio::sync::Mutex<Vec<MetricEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl MetricsStore for InMemoryStore {
    async fn append(&self, event: &MetricEvent) -> Result<(), GatewayError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Store that fails every append, for exercising the best-effort path
#[cfg(test)]
pub struct FailingStore;

#[cfg(test)]
#[async_trait]
impl MetricsStore for FailingStore {
    async fn append(&self, _event: &MetricEvent) -> Result<(), GatewayError> {
        Err(GatewayError::Persistence("disk full".into()))
    }
}
