//! Bounded response store with LRU eviction and TTL expiration.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use xxhash_rust::xxh3::xxh3_64;

use crate::types::Message;

/// A cached response with timestamp for TTL checking
struct CachedEntry {
    payload: serde_json::Value,
    created_at: Instant,
}

impl CachedEntry {
    fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Canonical digest of a request payload.
///
/// Order-preserving: the same message sequence in the same order always
/// hashes identically, and a reordered or altered sequence does not. Role
/// and content are separated and messages delimited so concatenation cannot
/// make distinct sequences collide.
pub fn request_digest(messages: &[Message]) -> u64 {
    let mut input = String::new();
    for msg in messages {
        input.push_str(&msg.role);
        input.push('\0');
        input.push_str(&msg.content);
        input.push('\n');
    }
    xxh3_64(input.as_bytes())
}

/// Hash-keyed response store with LRU eviction and TTL expiration
pub struct CacheStore {
    entries: LruCache<u64, CachedEntry>,
    ttl: Duration,
}

impl CacheStore {
    /// Create a store with the given capacity and TTL
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Look up a cached payload by digest.
    ///
    /// An expired entry is evicted by the lookup itself and reported as a
    /// miss.
    pub fn get(&mut self, key: u64) -> Option<serde_json::Value> {
        if let Some(entry) = self.entries.get(&key) {
            if entry.is_expired(self.ttl) {
                self.entries.pop(&key);
                return None;
            }
            return Some(entry.payload.clone());
        }
        None
    }

    /// Store a payload, unconditionally overwriting any existing entry for
    /// the digest, then sweep other expired entries. The sweep bounds stale
    /// memory without a background task; returns how many entries expired.
    pub fn put(&mut self, key: u64, payload: serde_json::Value) -> usize {
        self.entries.put(key, CachedEntry::new(payload));
        self.evict_expired()
    }

    /// Get the current number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove expired entries, returning how many were dropped
    pub fn evict_expired(&mut self) -> usize {
        let ttl = self.ttl;
        let expired: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| *key)
            .collect();

        let count = expired.len();
        for key in expired {
            self.entries.pop(&key);
        }
        count
    }
}
