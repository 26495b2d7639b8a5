//! Content-addressed, TTL-bounded memoization of computed views.
//!
//! Entries are keyed by [`ViewKey`]: the identity of the source snapshot, a
//! fingerprint of the subset filter and a description of the view parameters.
//! Values are shared as [`Arc`] so callers never copy a cached view.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use traffic_data::filter::SubsetFilter;
use traffic_data::reader::SnapshotId;

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default entry lifetime in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Default maximum number of entries before the oldest is evicted.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

// ── ViewKey ───────────────────────────────────────────────────────────────────

/// Identity of one computed view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub snapshot: SnapshotId,
    pub filter: u64,
    /// View name plus any parameters that change its output.
    pub params: String,
}

impl ViewKey {
    pub fn new(snapshot: SnapshotId, filter: &SubsetFilter, params: impl Into<String>) -> Self {
        Self {
            snapshot,
            filter: filter.fingerprint(),
            params: params.into(),
        }
    }
}

// ── CacheStats ────────────────────────────────────────────────────────────────

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub evictions: u64,
}

// ── ViewCache ─────────────────────────────────────────────────────────────────

struct CacheEntry<V> {
    value: Arc<V>,
    inserted_at: Instant,
}

/// Memoization table for views of type `V`.
///
/// # Example
/// ```
/// use traffic_runtime::cache::{ViewCache, ViewKey};
/// use traffic_data::filter::SubsetFilter;
/// use traffic_data::reader::SnapshotId;
///
/// let mut cache: ViewCache<u64> = ViewCache::default();
/// let key = ViewKey::new(SnapshotId(7), &SubsetFilter::default(), "total");
/// let value = cache
///     .get_or_try_insert_with(key.clone(), || Ok::<_, ()>(42))
///     .unwrap();
/// assert_eq!(*value, 42);
/// assert_eq!(cache.stats().misses, 1);
/// ```
pub struct ViewCache<V> {
    /// Maximum age of an entry before it is treated as absent.
    ttl: Duration,
    /// Upper bound on stored entries.
    max_entries: usize,
    entries: HashMap<ViewKey, CacheEntry<V>>,
    stats: CacheStats,
}

impl<V> Default for ViewCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL_SECS, DEFAULT_MAX_ENTRIES)
    }
}

impl<V> ViewCache<V> {
    /// Create a cache. A `max_entries` of zero is treated as one.
    pub fn new(ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Cached value for `key` if present and within its TTL.
    pub fn get(&mut self, key: &ViewKey) -> Option<Arc<V>> {
        let fresh = self
            .entries
            .get(key)
            .map(|e| e.inserted_at.elapsed() < self.ttl);
        match fresh {
            Some(true) => {
                self.stats.hits += 1;
                self.entries.get(key).map(|e| Arc::clone(&e.value))
            }
            Some(false) => {
                self.entries.remove(key);
                self.stats.misses += 1;
                tracing::debug!(snapshot = %key.snapshot, "expired cache entry dropped");
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store `value` under `key`, evicting expired entries and then the
    /// oldest ones while the cache is full.
    pub fn insert(&mut self, key: ViewKey, value: V) -> Arc<V> {
        if !self.entries.contains_key(&key) {
            self.make_room();
        }
        let value = Arc::new(value);
        self.entries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                inserted_at: Instant::now(),
            },
        );
        value
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// Errors from `compute` are passed through and nothing is stored.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: ViewKey,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = compute()?;
        Ok(self.insert(key, value))
    }

    /// Drop every entry computed from `snapshot`.
    pub fn invalidate_snapshot(&mut self, snapshot: SnapshotId) {
        let before = self.entries.len();
        self.entries.retain(|k, _| k.snapshot != snapshot);
        tracing::debug!(
            %snapshot,
            removed = before - self.entries.len(),
            "snapshot invalidated"
        );
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        tracing::debug!("cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn make_room(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.inserted_at.elapsed() < ttl);

        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    self.stats.evictions += 1;
                }
                None => break,
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn key(snapshot: u64, params: &str) -> ViewKey {
        ViewKey::new(SnapshotId(snapshot), &SubsetFilter::default(), params)
    }

    // ── hits and misses ───────────────────────────────────────────────────

    #[test]
    fn test_second_lookup_is_a_hit() {
        let mut cache: ViewCache<String> = ViewCache::default();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>("view".to_string())
        };

        let a = cache.get_or_try_insert_with(key(1, "report"), compute).unwrap();
        let b = cache.get_or_try_insert_with(key(1, "report"), compute).unwrap();

        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_keys_differ_by_filter_and_params() {
        let mut cache: ViewCache<u32> = ViewCache::default();
        cache.insert(key(1, "report"), 1);

        let filtered = ViewKey::new(
            SnapshotId(1),
            &SubsetFilter::from_lists(None, None, &["Home".to_string()], &[], &[]),
            "report",
        );
        assert!(cache.get(&filtered).is_none());
        assert!(cache.get(&key(1, "validate")).is_none());
        assert!(cache.get(&key(2, "report")).is_none());
        assert_eq!(cache.get(&key(1, "report")).as_deref(), Some(&1));
    }

    #[test]
    fn test_errors_are_not_cached() {
        let mut cache: ViewCache<u32> = ViewCache::default();
        let err = cache.get_or_try_insert_with(key(1, "x"), || Err("boom"));
        assert_eq!(err.unwrap_err(), "boom");
        assert!(cache.is_empty());
    }

    // ── expiry and eviction ───────────────────────────────────────────────

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let mut cache: ViewCache<u32> = ViewCache::new(0, 10);
        cache.insert(key(1, "x"), 5);
        assert!(cache.get(&key(1, "x")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oldest_entry_evicted_when_full() {
        let mut cache: ViewCache<u32> = ViewCache::new(DEFAULT_CACHE_TTL_SECS, 2);
        cache.insert(key(1, "a"), 1);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert(key(1, "b"), 2);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert(key(1, "c"), 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(1, "a")).is_none());
        assert!(cache.get(&key(1, "c")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_reinserting_existing_key_does_not_evict() {
        let mut cache: ViewCache<u32> = ViewCache::new(DEFAULT_CACHE_TTL_SECS, 1);
        cache.insert(key(1, "a"), 1);
        cache.insert(key(1, "a"), 2);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.get(&key(1, "a")).as_deref(), Some(&2));
    }

    // ── invalidation ──────────────────────────────────────────────────────

    #[test]
    fn test_invalidate_snapshot_keeps_other_snapshots() {
        let mut cache: ViewCache<u32> = ViewCache::default();
        cache.insert(key(1, "a"), 1);
        cache.insert(key(1, "b"), 2);
        cache.insert(key(2, "a"), 3);

        cache.invalidate_snapshot(SnapshotId(1));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(2, "a")).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
