//! Bounded LRU cache with per-entry TTL for resolved segment lists.
//!
//! Every operation takes the same mutex, so a reader never observes a
//! half-applied `save` or `reset`. Values are cloned out; callers never hold
//! a reference into the cache.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Cache of qualified segment names keyed by `"<userKey>-$-<userValue>"`.
pub type SegmentsCache = ExpiringLruCache<String, Vec<String>>;

struct CacheEntry<V> {
    value: V,
    refreshed_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.refreshed_at) > ttl
    }
}

/// Hit/miss counters, updated without taking the cache lock.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Entries dropped to make room for a new key.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Entries dropped because their TTL had passed.
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }
}

pub struct ExpiringLruCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    max_size: usize,
    ttl: Duration,
    stats: CacheStats,
}

impl<K: Hash + Eq, V: Clone> ExpiringLruCache<K, V> {
    /// Create a cache holding at most `max_size` entries, each valid for `ttl`
    /// after its last save or hit. A `max_size` of zero disables caching.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_size,
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// Return a copy of the value if present and fresh, marking it most
    /// recently used. A stale entry is removed and reported as a miss.
    pub fn lookup(&self, key: &K) -> Option<V> {
        if self.max_size == 0 {
            self.stats.record_miss();
            return None;
        }

        let now = Instant::now();
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get_mut(key) else {
            self.stats.record_miss();
            return None;
        };

        if entry.is_expired(self.ttl, now) {
            entries.pop(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            return None;
        }

        entry.refreshed_at = now;
        self.stats.record_hit();
        Some(entry.value.clone())
    }

    /// Insert or overwrite `key`, evicting the least recently used entry if a
    /// new key would push the cache past `max_size`.
    pub fn save(&self, key: K, value: V) {
        if self.max_size == 0 {
            return;
        }

        let entry = CacheEntry {
            value,
            refreshed_at: Instant::now(),
        };

        let mut entries = self.entries.lock();
        let overwrite = entries.contains(&key);
        if entries.push(key, entry).is_some() && !overwrite {
            self.stats.record_eviction();
            trace!(max_size = self.max_size, "evicted least recently used entry");
        }
    }

    /// Drop every entry.
    pub fn reset(&self) {
        self.entries.lock().clear();
    }

    /// Drop all expired entries, returning how many were removed.
    pub fn expire_stale(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();

        // Drain coldest-first and push survivors back in the same order so
        // recency is preserved.
        let survivors: Vec<(K, CacheEntry<V>)> = std::iter::from_fn(|| entries.pop_lru())
            .filter(|(_, entry)| !entry.is_expired(self.ttl, now))
            .collect();
        for (key, entry) in survivors {
            entries.push(key, entry);
        }

        let removed = before - entries.len();
        self.stats.record_expirations(removed as u64);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for ExpiringLruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringLruCache")
            .field("max_size", &self.max_size)
            .field("ttl", &self.ttl)
            .field("current_entries", &self.entries.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn cache(max_size: usize, ttl_secs: u64) -> ExpiringLruCache<String, Vec<String>> {
        ExpiringLruCache::new(max_size, Duration::from_secs(ttl_secs))
    }

    #[test]
    fn test_save_then_lookup() {
        let cache = cache(10, 600);
        cache.save("vuid-$-u1".to_string(), segments(&["a", "b"]));

        assert_eq!(cache.lookup(&"vuid-$-u1".to_string()), Some(segments(&["a", "b"])));
        assert_eq!(cache.lookup(&"vuid-$-u2".to_string()), None);
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let cache = cache(2, 600);
        cache.save("a".to_string(), segments(&["x"]));
        cache.save("a".to_string(), segments(&["y"]));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&"a".to_string()), Some(segments(&["y"])));
        assert_eq!(cache.stats().evictions(), 0);
    }

    #[test]
    fn test_never_exceeds_max_size() {
        let cache = cache(3, 600);
        for i in 0..50 {
            cache.save(format!("key-{i}"), segments(&["s"]));
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions(), 47);
    }

    #[test]
    fn test_lru_eviction_respects_reads() {
        let cache = cache(2, 600);
        cache.save("A".to_string(), segments(&["a"]));
        cache.save("B".to_string(), segments(&["b"]));
        assert!(cache.lookup(&"A".to_string()).is_some());
        cache.save("C".to_string(), segments(&["c"]));

        assert!(cache.lookup(&"A".to_string()).is_some());
        assert!(cache.lookup(&"B".to_string()).is_none());
        assert!(cache.lookup(&"C".to_string()).is_some());
    }

    #[test]
    fn test_reset_clears_everything() {
        let cache = cache(10, 600);
        cache.save("a".to_string(), segments(&["x"]));
        cache.save("b".to_string(), segments(&["y"]));
        cache.reset();

        assert!(cache.is_empty());
        assert!(cache.lookup(&"a".to_string()).is_none());
        assert!(cache.lookup(&"b".to_string()).is_none());
    }

    #[test]
    fn test_zero_size_disables_caching() {
        let cache = cache(0, 600);
        cache.save("a".to_string(), segments(&["x"]));

        assert!(cache.is_empty());
        assert!(cache.lookup(&"a".to_string()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_on_lookup() {
        let cache = cache(10, 600);
        cache.save("a".to_string(), segments(&["x"]));

        tokio::time::advance(Duration::from_secs(600)).await;
        assert!(cache.lookup(&"a".to_string()).is_some(), "exactly ttl is still fresh");

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(cache.lookup(&"a".to_string()).is_none());
        assert!(cache.is_empty(), "stale entry removed on lookup");
        assert_eq!(cache.stats().expirations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_expires_once_time_passes() {
        let cache = cache(10, 0);
        cache.save("a".to_string(), segments(&["x"]));
        assert!(cache.lookup(&"a".to_string()).is_some());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.lookup(&"a".to_string()).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_refreshes_timestamp() {
        let cache = cache(10, 600);
        cache.save("a".to_string(), segments(&["x"]));

        tokio::time::advance(Duration::from_secs(500)).await;
        assert!(cache.lookup(&"a".to_string()).is_some());

        tokio::time::advance(Duration::from_secs(500)).await;
        assert!(cache.lookup(&"a".to_string()).is_some());

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(cache.lookup(&"a".to_string()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_stale_sweeps_only_expired() {
        let cache = cache(10, 600);
        cache.save("old-1".to_string(), segments(&["x"]));
        cache.save("old-2".to_string(), segments(&["x"]));
        cache.save("old-3".to_string(), segments(&["x"]));

        tokio::time::advance(Duration::from_secs(400)).await;
        cache.save("new".to_string(), segments(&["y"]));
        // refresh old-1 so a stale entry sits behind a fresh one in LRU order
        assert!(cache.lookup(&"old-1".to_string()).is_some());
        tokio::time::advance(Duration::from_secs(10)).await;
        cache.save("old-2".to_string(), segments(&["z"]));

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(cache.expire_stale(), 1);
        assert_eq!(cache.len(), 3);
        assert!(cache.lookup(&"old-3".to_string()).is_none());
        assert_eq!(cache.lookup(&"old-2".to_string()), Some(segments(&["z"])));
        assert!(cache.lookup(&"new".to_string()).is_some());
        assert!(cache.lookup(&"old-1".to_string()).is_some());
    }

    #[test]
    fn test_concurrent_saves_stay_bounded() {
        let cache = std::sync::Arc::new(cache(8, 600));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        cache.save(format!("t{t}-{i}"), segments(&["s"]));
                        let _ = cache.lookup(&format!("t{t}-{}", i / 2));
                        if i % 97 == 0 {
                            cache.reset();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 8);
    }
}
