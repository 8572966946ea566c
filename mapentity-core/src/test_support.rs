//! Test-only, in-memory model and cache doubles used by unit and behaviour
//! tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    CacheEntry, CacheKey, CacheStore, EntityModel, MemoryCacheStore, ModelIdentity, Queryset, Row,
    Timestamp,
};

/// In-memory [`EntityModel`] with an adjustable mutation timestamp.
///
/// Every row pulled out of [`EntityModel::rows`] is counted, which lets
/// tests observe whether an export recomputed its payload or reused a
/// cached one.
#[derive(Debug)]
pub struct MemoryModel {
    identity: ModelIdentity,
    app_label: String,
    verbose_name: Option<String>,
    rows: RwLock<Vec<Row>>,
    latest: RwLock<Option<Timestamp>>,
    rows_read: Arc<AtomicUsize>,
}

impl MemoryModel {
    /// An empty model owned by `app_label`.
    pub fn new(identity: impl AsRef<str>, app_label: impl Into<String>) -> Self {
        Self {
            identity: ModelIdentity::new(identity),
            app_label: app_label.into(),
            verbose_name: None,
            rows: RwLock::new(Vec::new()),
            latest: RwLock::new(None),
            rows_read: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the rows.
    #[must_use]
    pub fn with_rows<I>(self, rows: I) -> Self
    where
        I: IntoIterator<Item = Row>,
    {
        *self.rows.write().unwrap_or_else(PoisonError::into_inner) = rows.into_iter().collect();
        self
    }

    /// Set the latest mutation time.
    #[must_use]
    pub fn with_latest(self, latest: Timestamp) -> Self {
        self.touch(latest);
        self
    }

    /// Set the human readable name.
    #[must_use]
    pub fn with_verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = Some(name.into());
        self
    }

    /// Record a mutation at `at`.
    pub fn touch(&self, at: Timestamp) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(at);
    }

    /// Replace a row, or append it when its key is new, and record a
    /// mutation at `at`.
    pub fn upsert(&self, row: Row, at: Timestamp) {
        {
            let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
            match rows.iter_mut().find(|existing| existing.pk == row.pk) {
                Some(existing) => *existing = row,
                None => rows.push(row),
            }
        }
        self.touch(at);
    }

    /// Number of rows pulled by consumers so far.
    #[must_use]
    pub fn rows_read(&self) -> usize {
        self.rows_read.load(Ordering::SeqCst)
    }
}

impl EntityModel for MemoryModel {
    fn identity(&self) -> ModelIdentity {
        self.identity.clone()
    }

    fn app_label(&self) -> &str {
        &self.app_label
    }

    fn verbose_name(&self) -> String {
        self.verbose_name
            .clone()
            .unwrap_or_else(|| self.identity.to_string())
    }

    fn latest_mutation_timestamp(&self) -> Option<Timestamp> {
        *self.latest.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn rows(&self) -> Queryset<'_> {
        let counter = Arc::clone(&self.rows_read);
        let rows = self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Box::new(rows.into_iter().inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// [`CacheStore`] double counting reads and writes.
#[derive(Debug, Default)]
pub struct CountingCache {
    inner: MemoryCacheStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl CountingCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls.
    #[must_use]
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls.
    #[must_use]
    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

impl CacheStore for CountingCache {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn set(&self, key: CacheKey, entry: CacheEntry) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, entry);
    }
}
