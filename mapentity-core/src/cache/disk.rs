//! Cache persisted as one file per key under a scoped directory.
//!
//! Each file holds the RFC 3339 freshness on its first line followed by
//! the raw payload. Files are replaced through a rename so a reader never
//! sees a half-written entry.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use log::warn;
use mapentity_fs::ScopedDir;
use thiserror::Error;

use super::{CacheEntry, CacheKey, CacheStore};

/// Errors raised by [`DiskCacheStore`].
///
/// They never reach request handlers: reads degrade to misses and failed
/// writes are logged.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache directory or an entry could not be accessed.
    #[error("cache I/O failed for {path}")]
    Io {
        /// Path being accessed.
        path: Utf8PathBuf,
        /// Source error.
        #[source]
        source: io::Error,
    },
    /// An entry did not follow the `freshness\npayload` layout.
    #[error("cache entry {name} is corrupt: {reason}")]
    Corrupt {
        /// Storage name of the entry.
        name: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Layer cache stored on disk.
#[derive(Debug)]
pub struct DiskCacheStore {
    dir: ScopedDir,
}

impl DiskCacheStore {
    /// Open the cache rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns [`CacheError::Io`] when the directory cannot be created or
    /// opened.
    pub fn open(root: &Utf8Path) -> Result<Self, CacheError> {
        let dir = ScopedDir::create(root).map_err(|source| CacheError::Io {
            path: root.to_owned(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the entries.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        self.dir.root()
    }

    /// Read the entry stored for `key`.
    ///
    /// # Errors
    /// Returns [`CacheError::Io`] on read failures other than a missing
    /// file and [`CacheError::Corrupt`] when the file cannot be decoded.
    pub fn try_get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let name = key.storage_name();
        let bytes = match self.dir.read(Utf8Path::new(&name)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.root().join(&name),
                    source,
                });
            }
        };
        decode(&name, &bytes).map(Some)
    }

    /// Persist `entry` under `key`.
    ///
    /// # Errors
    /// Returns [`CacheError::Io`] when the entry cannot be written.
    pub fn try_set(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
        let name = key.storage_name();
        let freshness = entry.freshness.to_rfc3339();
        let mut bytes = Vec::with_capacity(freshness.len() + 1 + entry.payload.len());
        bytes.extend_from_slice(freshness.as_bytes());
        bytes.push(b'\n');
        bytes.extend_from_slice(&entry.payload);
        self.dir
            .write_atomic(&name, &bytes)
            .map_err(|source| CacheError::Io {
                path: self.root().join(&name),
                source,
            })
    }
}

fn decode(name: &str, bytes: &[u8]) -> Result<CacheEntry, CacheError> {
    let corrupt = |reason: String| CacheError::Corrupt {
        name: name.to_owned(),
        reason,
    };
    let newline = bytes
        .iter()
        .position(|byte| *byte == b'\n')
        .ok_or_else(|| corrupt("missing freshness line".to_owned()))?;
    let (head, tail) = bytes.split_at(newline);
    let payload = tail.split_first().map_or(&[][..], |(_, rest)| rest);
    let text = std::str::from_utf8(head).map_err(|err| corrupt(err.to_string()))?;
    let freshness = DateTime::parse_from_rfc3339(text)
        .map_err(|err| corrupt(err.to_string()))?
        .with_timezone(&Utc);
    Ok(CacheEntry::new(freshness, payload.to_vec()))
}

impl CacheStore for DiskCacheStore {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.try_get(key).unwrap_or_else(|err| {
            warn!("ignoring cached layer {key}: {err}");
            None
        })
    }

    fn set(&self, key: CacheKey, entry: CacheEntry) {
        if let Err(err) = self.try_set(&key, &entry) {
            warn!("could not cache layer {key}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Language, ModelIdentity};
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().unwrap_or_else(|err| panic!("create temporary directory: {err}"))
    }

    fn store_in(dir: &TempDir) -> DiskCacheStore {
        let root = Utf8Path::from_path(dir.path()).unwrap_or_else(|| panic!("utf8 temp path"));
        DiskCacheStore::open(&root.join("layers"))
            .unwrap_or_else(|err| panic!("open disk cache: {err}"))
    }

    fn key() -> CacheKey {
        CacheKey::new(ModelIdentity::new("trek"), Language::new("fr"))
    }

    #[rstest]
    fn entries_survive_reopening(temp_dir: TempDir) {
        let freshness = Utc
            .with_ymd_and_hms(2024, 6, 2, 12, 0, 0)
            .single()
            .unwrap_or_else(|| panic!("valid timestamp"));
        let payload = b"{\"type\":\"FeatureCollection\",\n\"features\":[]}".to_vec();
        store_in(&temp_dir).set(key(), CacheEntry::new(freshness, payload.clone()));

        let entry = store_in(&temp_dir)
            .get(&key())
            .unwrap_or_else(|| panic!("entry persisted"));
        assert_eq!(entry.freshness, freshness);
        assert_eq!(entry.payload.to_vec(), payload);
        assert!(temp_dir.path().join("layers/fr_trek_layer_json").is_file());
    }

    #[rstest]
    fn missing_entry_is_a_miss(temp_dir: TempDir) {
        assert_eq!(store_in(&temp_dir).try_get(&key()).ok(), Some(None));
    }

    #[rstest]
    fn corrupt_entry_is_a_miss(temp_dir: TempDir) {
        let store = store_in(&temp_dir);
        std::fs::write(
            temp_dir.path().join("layers/fr_trek_layer_json"),
            b"yesterday\n[]",
        )
        .unwrap_or_else(|err| panic!("write corrupt entry: {err}"));
        assert!(matches!(
            store.try_get(&key()),
            Err(CacheError::Corrupt { .. })
        ));
        assert!(store.get(&key()).is_none());
    }
}
