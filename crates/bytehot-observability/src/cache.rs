//! Bounded, TTL'd, content-addressed cache.
//!
//! A `DashMap`-backed cache with periodic cleanup, shaped for the two
//! callers that need it: the bytecode validator (digest -> verdict) and the
//! router's class-metadata cache (class name -> metadata, invalidated on a
//! successful redefinition rather than by TTL).

use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    last_accessed: Instant,
}

/// A cache keyed by `K`, evicting entries older than a fixed TTL and, once
/// over `max_entries`, the least-recently-accessed entry first.
///
/// Eviction on overflow scans the whole map (`O(n)` in entry count) rather
/// than keeping a separate LRU list; at the entry counts this cache is sized
/// for (bounded validation/metadata caches, not a general-purpose store)
/// that is the simpler and cheaper choice.
pub struct LruTtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    max_entries: usize,
    ttl: Duration,
}

impl<K, V> LruTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `max_entries`, expiring entries after
    /// `ttl` has elapsed since insertion.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            ttl,
        }
    }

    /// Look up `key`, returning `None` if absent or expired. A hit refreshes
    /// the entry's recency for LRU purposes.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entry = self.entries.get_mut(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        entry.last_accessed = Instant::now();
        Some(entry.value.clone())
    }

    /// Insert or replace the cached value for `key`, evicting the
    /// least-recently-accessed entry first if this insertion would exceed
    /// `max_entries`.
    pub fn insert(&self, key: K, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_lru();
        }
        let now = Instant::now();
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                last_accessed: now,
            },
        );
    }

    /// Return the cached value for `key` if present and unexpired, otherwise
    /// compute it with `f`, insert it, and return it.
    pub fn get_or_insert_with(&self, key: K, f: impl FnOnce() -> V) -> V {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = f();
        self.insert(key.clone(), value.clone());
        value
    }

    /// Remove `key` from the cache unconditionally, used when an external
    /// event (e.g. a successful redefinition) invalidates cached metadata.
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries currently stored, including ones that have expired
    /// but have not yet been evicted by a `get`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_lru(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_accessed)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_insert_then_hit() {
        let cache: LruTtlCache<String, u32> = LruTtlCache::new(8, Duration::from_secs(60));
        assert_eq!(cache.get(&"a".to_string()), None);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn expired_entries_are_treated_as_absent() {
        let cache: LruTtlCache<&str, u32> = LruTtlCache::new(8, Duration::from_millis(10));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn overflow_evicts_the_least_recently_accessed_entry() {
        let cache: LruTtlCache<&str, u32> = LruTtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("b", 2);
        // touch "b" so "a" becomes the least-recently-accessed entry
        std::thread::sleep(Duration::from_millis(5));
        cache.get(&"b");
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn invalidate_removes_regardless_of_ttl() {
        let cache: LruTtlCache<&str, u32> = LruTtlCache::new(8, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn get_or_insert_with_only_computes_once() {
        let cache: LruTtlCache<&str, u32> = LruTtlCache::new(8, Duration::from_secs(60));
        let mut calls = 0;
        let mut compute = || {
            calls += 1;
            42
        };
        assert_eq!(cache.get_or_insert_with("a", &mut compute), 42);
        assert_eq!(cache.get_or_insert_with("a", &mut compute), 42);
        assert_eq!(calls, 1);
    }
}
