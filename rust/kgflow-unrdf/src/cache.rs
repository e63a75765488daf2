//! Bounded TTL cache for query results, keyed by the literal query text

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;

struct CacheEntry {
    value: Value,
    inserted_at: DateTime<Utc>,
}

/// LRU map of query text to last result, with TTL checked on read.
/// A TTL of zero inserts entries that are never returned (bypass).
pub struct QueryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    hits: Mutex<u64>,
    misses: Mutex<u64>,
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
    pub capacity: usize,
}

impl QueryCache {
    pub fn new(max_size: usize, ttl_seconds: u64) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::seconds(ttl_seconds as i64),
            hits: Mutex::new(0),
            misses: Mutex::new(0),
        }
    }

    /// Cached value iff present and still within TTL; expired entries are
    /// evicted on the way out
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) => Utc::now() - entry.inserted_at >= self.ttl,
            None => {
                *self.misses.lock() += 1;
                return None;
            }
        };
        if expired {
            entries.pop(key);
            *self.misses.lock() += 1;
            return None;
        }
        *self.hits.lock() += 1;
        entries.get(key).map(|e| e.value.clone())
    }

    /// Insert, evicting the least-recently-used entry on overflow
    pub fn set(&self, key: &str, value: Value) {
        self.entries.lock().put(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Utc::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        *self.hits.lock() = 0;
        *self.misses.lock() = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let hits = *self.hits.lock();
        let misses = *self.misses.lock();
        let total = hits + misses;
        let entries = self.entries.lock();
        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            size: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_within_ttl_returns_same_value() {
        let cache = QueryCache::new(10, 3600);
        cache.set("ASK { ?s ?p ?o }", json!(true));

        assert_eq!(cache.get("ASK { ?s ?p ?o }"), Some(json!(true)));
        assert_eq!(cache.get("ASK { ?s ?p ?o }"), Some(json!(true)));
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
    }

    #[test]
    fn zero_ttl_entries_never_return() {
        let cache = QueryCache::new(10, 0);
        cache.set("q", json!(42));
        assert_eq!(cache.get("q"), None);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn lru_evicts_oldest_on_overflow() {
        let cache = QueryCache::new(2, 3600);
        cache.set("a", json!(1));
        cache.set("b", json!(2));
        cache.set("c", json!(3));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(json!(2)));
        assert_eq!(cache.get("c"), Some(json!(3)));
    }

    #[test]
    fn miss_counts_tracked() {
        let cache = QueryCache::new(4, 3600);
        assert_eq!(cache.get("missing"), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.0);
    }
}
