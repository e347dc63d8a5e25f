//! Configuration for the response cache.

use std::time::Duration;

/// Configuration for the response cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries; oldest-accessed entries are evicted when
    /// the cache is full
    pub capacity: usize,

    /// Time-to-live for cache entries
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl CacheConfig {
    /// Create config optimized for low memory usage
    pub fn low_memory() -> Self {
        Self {
            capacity: 100,
            ttl: Duration::from_secs(1800), // 30 minutes
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TOLLGATE_CACHE_SIZE") {
            if let Ok(n) = val.parse() {
                config.capacity = n;
            }
        }

        if let Ok(val) = std::env::var("TOLLGATE_CACHE_TTL_SECS") {
            if let Ok(n) = val.parse() {
                config.ttl = Duration::from_secs(n);
            }
        }

        config
    }
}
