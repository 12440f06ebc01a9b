//! TTL cache with capacity eviction and metrics
//!
//! Process-wide cache for tool results: entries expire after a TTL, the
//! oldest entry is evicted when the cache is full, and hit/miss counters
//! feed the session metrics. Reads are lock-free (`DashMap`); writes use
//! store-if-absent semantics so two racing writers for one key keep the
//! first value.
//!
//! A cached read is *free* from the caller's budget point of view: the tool
//! invoker only debits an analyst's call budget on an actual dispatch.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};

/// A cached value plus its insertion time.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Cache hit/miss counters.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheMetrics {
    /// Total lookups that returned a live entry
    pub hits: u64,
    /// Total lookups that found nothing (or an expired entry)
    pub misses: u64,
    /// Entries evicted for age or capacity
    pub evictions: u64,
}

impl CacheMetrics {
    /// Hit ratio in `[0, 1]`; zero when no lookups happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// TTL + capacity bounded cache.
pub struct TtlCache<V: Clone> {
    entries: DashMap<String, CacheEntry<V>>,
    max_size: usize,
    ttl: Duration,
    metrics: Mutex<CacheMetrics>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache holding at most `max_size` entries, each live for `ttl`.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_size,
            ttl,
            metrics: Mutex::new(CacheMetrics::default()),
        }
    }

    /// Look up a key, counting the hit or miss. Expired entries are removed
    /// on access and count as misses.
    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.inserted_at.elapsed() <= self.ttl {
                    let value = entry.value.clone();
                    self.metrics.lock().hits += 1;
                    return Some(value);
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(key);
            self.metrics.lock().evictions += 1;
        }
        self.metrics.lock().misses += 1;
        None
    }

    /// Insert a value, evicting the oldest entry when at capacity. If the
    /// key already holds a live value, the existing value is kept
    /// (store-if-absent).
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(existing) = self.entries.get(&key) {
            if existing.inserted_at.elapsed() <= self.ttl {
                return;
            }
        }

        if self.entries.len() >= self.max_size {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().inserted_at)
                .map(|e| e.key().clone());
            if let Some(oldest_key) = oldest {
                self.entries.remove(&oldest_key);
                self.metrics.lock().evictions += 1;
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of live entries (including not-yet-collected expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot the hit/miss counters.
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.lock().clone()
    }

    /// Drop all entries and reset counters.
    pub fn clear(&self) {
        self.entries.clear();
        *self.metrics.lock() = CacheMetrics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_after_insert() {
        let cache: TtlCache<String> = TtlCache::new(10, Duration::from_secs(60));
        cache.insert("k", "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_miss_then_hit_gives_half_rate() {
        let cache: TtlCache<i32> = TtlCache::new(10, Duration::from_secs(60));
        assert_eq!(cache.get("k"), None);
        cache.insert("k", 1);
        assert_eq!(cache.get("k"), Some(1));

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert!((metrics.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_expired_entry_counts_as_miss() {
        let cache: TtlCache<i32> = TtlCache::new(10, Duration::from_millis(0));
        cache.insert("k", 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.metrics().misses, 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache: TtlCache<i32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b", 2);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_store_if_absent_keeps_first_value() {
        let cache: TtlCache<i32> = TtlCache::new(10, Duration::from_secs(60));
        cache.insert("k", 1);
        cache.insert("k", 2);
        assert_eq!(cache.get("k"), Some(1));
    }
}
