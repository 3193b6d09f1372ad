//! Generic capacity- and TTL-bounded cache with last-touch eviction.
//!
//! Recency is tracked as the last-touch timestamp rather than a separate
//! ordering structure; eviction scans are linear, which is fine at the
//! small capacities this crate uses (the feature store defaults to 10).

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    touched: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Value for `key` if present and fresh. A hit refreshes recency; an
    /// expired entry is removed and reported absent.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.expire(key) {
            return None;
        }
        let entry = self.entries.get_mut(key)?;
        entry.touched = Instant::now();
        Some(&entry.value)
    }

    /// Insert `value` under `key`. When at capacity and the key is new,
    /// the single oldest-touched entry is evicted first.
    pub fn set(&mut self, key: K, value: V) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            Entry {
                value,
                touched: Instant::now(),
            },
        );
    }

    /// TTL-aware existence check. Removes a stale entry, refreshes nothing.
    pub fn has<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.expire(key) {
            return false;
        }
        self.entries.contains_key(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Eagerly sweep every expired entry.
    pub fn cleanup(&mut self) {
        let ttl = self.ttl;
        let now = Instant::now();
        self.entries
            .retain(|_, e| now.duration_since(e.touched) <= ttl);
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.touched)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    fn expire<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let stale = match self.entries.get(key) {
            Some(entry) => entry.touched.elapsed() > self.ttl,
            None => false,
        };
        if stale {
            self.entries.remove(key);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    const LONG: Duration = Duration::from_secs(60);

    #[test]
    fn test_capacity_evicts_least_recently_touched() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(2, LONG);
        cache.set("a", 1);
        sleep(Duration::from_millis(5));
        cache.set("b", 2);
        sleep(Duration::from_millis(5));

        // Touch "a" so "b" becomes the eviction candidate
        assert_eq!(cache.get("a"), Some(&1));
        sleep(Duration::from_millis(5));

        cache.set("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(&1));
        assert_eq!(cache.get("c"), Some(&3));
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(2, LONG);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(&10));
        assert_eq!(cache.get("b"), Some(&2));
    }

    #[test]
    fn test_expired_entries_absent_before_cleanup() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(4, Duration::from_millis(20));
        cache.set("a", 1);
        sleep(Duration::from_millis(40));

        // Lazy expiry: both get and has treat the entry as gone
        assert!(!cache.has("a"));
        cache.set("b", 2);
        sleep(Duration::from_millis(40));
        assert_eq!(cache.get("b"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_sweeps_only_stale_entries() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(4, Duration::from_millis(30));
        cache.set("old", 1);
        sleep(Duration::from_millis(50));
        cache.set("fresh", 2);

        cache.cleanup();
        assert_eq!(cache.len(), 1);
        assert!(cache.has("fresh"));
    }

    #[test]
    fn test_get_refreshes_ttl() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(4, Duration::from_millis(50));
        cache.set("a", 1);
        for _ in 0..4 {
            sleep(Duration::from_millis(25));
            assert_eq!(cache.get("a"), Some(&1), "touch must reset the clock");
        }
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache: TtlCache<String, u32> = TtlCache::new(4, LONG);
        cache.set("a".into(), 1);
        cache.set("b".into(), 2);
        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.remove("a"), None);
        cache.clear();
        assert!(cache.is_empty());
    }
}
