//! Bounded id → key cache shared by every resolver of a run.

use crate::lock;
use ctsync_types::ResourceId;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Configuration for the identifier cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of ids kept. Least recently used ids are evicted first.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// What the cache knows about one id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// The id maps to this key.
    Resolved(String),
    /// The remote was asked and has no key for this id.
    Absent,
}

/// Maps remote ids to human keys.
///
/// An id the remote confirmed has no key is cached as [`CacheEntry::Absent`]
/// so it is not queried again. A resolved entry never turns back into an
/// absent one. Ids being looked up are tracked by the lookup client, not here.
pub struct IdentifierCache {
    entries: Mutex<LruCache<ResourceId, CacheEntry>>,
}

impl Default for IdentifierCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl IdentifierCache {
    /// Creates an empty cache. A capacity of zero is raised to one.
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The resolved key of `id`, if known.
    pub fn get(&self, id: &str) -> Option<String> {
        match lock(&self.entries).get(id) {
            Some(CacheEntry::Resolved(key)) => Some(key.clone()),
            _ => None,
        }
    }

    /// Everything known about `id`; `None` if it was never looked up.
    pub fn entry(&self, id: &str) -> Option<CacheEntry> {
        lock(&self.entries).get(id).cloned()
    }

    /// Records that `id` maps to `key`.
    pub fn put(&self, id: impl Into<ResourceId>, key: impl Into<String>) {
        lock(&self.entries).put(id.into(), CacheEntry::Resolved(key.into()));
    }

    /// Records that `id` has no key. Ignored if `id` is already resolved.
    pub fn put_absent(&self, id: impl Into<ResourceId>) {
        let id = id.into();
        let mut entries = lock(&self.entries);
        if matches!(entries.peek(&id), Some(CacheEntry::Resolved(_))) {
            return;
        }
        entries.put(id, CacheEntry::Absent);
    }

    /// Whether `id` is known to map to a key.
    pub fn contains_resolved(&self, id: &str) -> bool {
        matches!(lock(&self.entries).peek(id), Some(CacheEntry::Resolved(_)))
    }

    /// Drops the absent marker of `id` so the next lookup asks the remote
    /// again. Resolved entries are kept.
    pub fn forget_absent(&self, id: &str) -> bool {
        let mut entries = lock(&self.entries);
        if matches!(entries.peek(id), Some(CacheEntry::Absent)) {
            entries.pop(id);
            return true;
        }
        false
    }

    /// Removes every entry.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    pub fn capacity(&self) -> usize {
        lock(&self.entries).cap().get()
    }
}
