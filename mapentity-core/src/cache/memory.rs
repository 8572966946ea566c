//! In-process cache backed by a concurrent map.

use dashmap::DashMap;

use super::{CacheEntry, CacheKey, CacheStore};

/// Cache kept in memory for the life of the process.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use mapentity_core::{CacheEntry, CacheKey, CacheStore, Language, MemoryCacheStore, ModelIdentity};
///
/// let cache = MemoryCacheStore::default();
/// let key = CacheKey::new(ModelIdentity::new("trek"), Language::new("en"));
/// cache.set(key.clone(), CacheEntry::new(Utc::now(), b"[]".to_vec()));
/// assert_eq!(cache.get(&key).map(|entry| entry.payload.len()), Some(2));
/// ```
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl MemoryCacheStore {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }
}
