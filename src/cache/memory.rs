use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use super::{CacheEntry, CacheKey};

/// Bounded in-process cache tier.
///
/// A single mutex guards the LRU map because reordering on access is a
/// compound read-modify-write. The lock is never held across an await point.
pub struct MemoryTier {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up an entry, refreshing its LRU position. Entries older than
    /// `ttl` are dropped and reported as absent.
    pub fn get(&self, key: &CacheKey, ttl: Duration) -> Option<CacheEntry> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(ttl) => Some(entry.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Insert an entry, evicting the least-recently-touched key when over
    /// capacity.
    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        self.lock().put(key, entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
        // A poisoned lock only means another request panicked mid-access;
        // the map itself is still structurally sound.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
