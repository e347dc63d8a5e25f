//! Time-bounded response memoization.
//!
//! The cache is keyed by a canonical digest of the request payload so two
//! semantically identical requests (same message sequence, same ordering)
//! share one entry. A hit fully short-circuits admission and the backend
//! call. Entries live until their TTL elapses or LRU pressure evicts them;
//! expired entries are removed lazily on lookup plus an opportunistic sweep
//! on every write, so no background task is needed.

mod config;
mod store;

pub use config::CacheConfig;
pub use store::{request_digest, CacheStore};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::Message;

/// Counters for monitoring cache behaviour
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub puts: AtomicU64,
    pub expirations: AtomicU64,
}

impl CacheMetrics {
    pub fn snapshot(&self, entries: usize) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            hits,
            misses,
            puts: self.puts.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries,
            hit_rate: if lookups > 0 {
                hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub expirations: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

/// Shared response cache used by the gateway
pub struct ResponseCache {
    store: Mutex<CacheStore>,
    metrics: Arc<CacheMetrics>,
    config: CacheConfig,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: Mutex::new(CacheStore::new(config.capacity, config.ttl)),
            metrics: Arc::new(CacheMetrics::default()),
            config,
        }
    }

    /// Try to get a cached payload for the message sequence
    pub async fn get(&self, messages: &[Message]) -> Option<serde_json::Value> {
        let key = request_digest(messages);
        let mut store = self.store.lock().await;
        match store.get(key) {
            Some(payload) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Cache hit");
                Some(payload)
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a payload for the message sequence.
    ///
    /// Unconditionally overwrites; concurrent misses for the same key may
    /// each call the backend, and the last successful write wins.
    pub async fn put(&self, messages: &[Message], payload: serde_json::Value) {
        let key = request_digest(messages);
        let mut store = self.store.lock().await;
        let expired = store.put(key, payload);
        self.metrics.puts.fetch_add(1, Ordering::Relaxed);
        if expired > 0 {
            self.metrics
                .expirations
                .fetch_add(expired as u64, Ordering::Relaxed);
            debug!(expired, "Swept expired cache entries on write");
        }
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.store.lock().await.len();
        self.metrics.snapshot(entries)
    }

    /// Clear all entries
    pub async fn clear(&self) {
        self.store.lock().await.clear();
    }

    /// Get the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn messages(content: &str) -> Vec<Message> {
        vec![Message::user(content)]
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = ResponseCache::new(CacheConfig::default());
        let msgs = messages("hello");

        assert!(cache.get(&msgs).await.is_none());
        cache.put(&msgs, json!({"text": "hi"})).await;
        assert_eq!(cache.get(&msgs).await.unwrap(), json!({"text": "hi"}));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.puts, 1);
        assert!((stats.hit_rate - 0.5).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = ResponseCache::new(CacheConfig {
            capacity: 10,
            ttl: Duration::from_millis(1),
        });
        let msgs = messages("hello");

        cache.put(&msgs, json!("v")).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.get(&msgs).await.is_none());
    }

    #[tokio::test]
    async fn test_distinct_sequences_do_not_share_entries() {
        let cache = ResponseCache::new(CacheConfig::default());
        cache.put(&messages("a"), json!("A")).await;
        cache.put(&messages("b"), json!("B")).await;

        assert_eq!(cache.get(&messages("a")).await.unwrap(), json!("A"));
        assert_eq!(cache.get(&messages("b")).await.unwrap(), json!("B"));
    }
}
