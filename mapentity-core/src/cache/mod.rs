//! Derived-data cache for map layers.
//!
//! Entries are keyed by model and language and carry the mutation time
//! they were computed against. Staleness is decided by comparing that
//! freshness with the model's current latest mutation; entries never
//! expire on their own and are overwritten, not deleted.

use std::fmt;
use std::sync::Arc;

use crate::{Language, ModelIdentity, Timestamp};

#[cfg(feature = "disk-cache")]
mod disk;
mod memory;

#[cfg(feature = "disk-cache")]
pub use disk::{CacheError, DiskCacheStore};
pub use memory::MemoryCacheStore;

/// Identifies one cached layer payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Model the payload was rendered for.
    pub model: ModelIdentity,
    /// Language of the rendered labels.
    pub language: Language,
}

impl CacheKey {
    /// Build a key.
    #[must_use]
    pub const fn new(model: ModelIdentity, language: Language) -> Self {
        Self { model, language }
    }

    /// Storage name, e.g. `fr_trek_layer_json`.
    #[must_use]
    pub fn storage_name(&self) -> String {
        format!("{}_{}_layer_json", self.language, self.model)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.model, self.language)
    }
}

/// A payload and the mutation time it reflects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Latest mutation of the model when the payload was computed.
    pub freshness: Timestamp,
    /// Serialised layer.
    pub payload: Arc<[u8]>,
}

impl CacheEntry {
    /// Build an entry.
    pub fn new(freshness: Timestamp, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            freshness,
            payload: payload.into(),
        }
    }

    /// Whether the entry may be served when the model last changed at
    /// `latest`.
    #[must_use]
    pub fn is_fresh(&self, latest: Timestamp) -> bool {
        self.freshness >= latest
    }
}

/// Shared key/value store of layer payloads.
///
/// Implementations must tolerate concurrent `get` and `set` on the same
/// key; a `set` replaces the whole entry atomically so readers observe
/// either the previous or the new entry, never a mix of both.
pub trait CacheStore: Send + Sync {
    /// Current entry for `key`.
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Store `entry` under `key`, replacing any previous entry.
    fn set(&self, key: CacheKey, entry: CacheEntry);
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        (**self).get(key)
    }

    fn set(&self, key: CacheKey, entry: CacheEntry) {
        (**self).set(key, entry);
    }
}
