//! Cache of base (pre-personalization) block structures
//!
//! Entries are keyed by course id plus content fingerprint and are never
//! edited in place: new content means a new fingerprint and a new entry.
//! Concurrent misses on the same key collapse into a single build.

use crate::error::{BuildError, CacheError, StoreError};
use crate::graph::GraphStore;
use crate::model::{BlockKey, BlockNode};
use crate::store::{CacheKey, StructureStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Bumped whenever the serialized layout of [`CacheEntry`] changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Serialized form of one cached structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub format_version: u32,
    pub course_id: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub root: BlockKey,
    pub nodes: Vec<BlockNode>,
}

impl CacheEntry {
    fn new(key: &CacheKey, structure: &GraphStore) -> Self {
        CacheEntry {
            format_version: CACHE_FORMAT_VERSION,
            course_id: key.course_id.clone(),
            fingerprint: key.fingerprint.clone(),
            created_at: Utc::now(),
            root: structure.root().clone(),
            nodes: structure.all_nodes().cloned().collect(),
        }
    }

    fn matches(&self, key: &CacheKey) -> bool {
        self.format_version == CACHE_FORMAT_VERSION
            && self.course_id == key.course_id
            && self.fingerprint == key.fingerprint
    }

    pub fn into_structure(self) -> GraphStore {
        GraphStore::from_nodes(self.root, self.nodes)
    }
}

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
}

pub struct StructureCache {
    store: Arc<dyn StructureStore>,
    /// One gate per key currently being built.
    in_flight: DashMap<CacheKey, Arc<Mutex<()>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
}

impl StructureCache {
    pub fn new(store: Arc<dyn StructureStore>) -> Self {
        StructureCache {
            store,
            in_flight: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            builds: AtomicU64::new(0),
        }
    }

    /// Return the cached structure for `(course_id, fingerprint)`, building
    /// and storing it with `build` on a miss.
    pub fn get_or_build<F>(
        &self,
        course_id: &str,
        fingerprint: &str,
        build: F,
    ) -> Result<GraphStore, CacheError>
    where
        F: FnOnce() -> Result<GraphStore, BuildError>,
    {
        let key = CacheKey::new(course_id, fingerprint);
        if let Some(structure) = self.lookup(&key)? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(structure);
        }

        let gate = Arc::clone(&self.in_flight.entry(key.clone()).or_default());
        let result = {
            let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);
            // Another caller may have finished the build while we waited.
            match self.lookup(&key) {
                Ok(Some(structure)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(structure)
                }
                Ok(None) => self.build_and_store(&key, build),
                Err(e) => Err(e),
            }
        };
        // Only the map still holds the gate once every waiter is done.
        drop(gate);
        self.in_flight
            .remove_if(&key, |_, g| Arc::strong_count(g) == 1);
        result
    }

    /// Delete every cached entry of a course, whatever its fingerprint.
    pub fn invalidate(&self, course_id: &str) -> Result<usize, CacheError> {
        let removed = with_retry("delete", course_id, || self.store.delete_course(course_id))
            .map_err(CacheError::Unavailable)?;
        tracing::info!("Invalidated {} cached structure(s) for {}", removed, course_id);
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
        }
    }

    /// Keys with a build gate still registered.
    #[cfg(test)]
    pub(crate) fn pending_builds(&self) -> usize {
        self.in_flight.len()
    }

    fn lookup(&self, key: &CacheKey) -> Result<Option<GraphStore>, CacheError> {
        let bytes = match with_retry("read", key, || self.store.get(key))
            .map_err(CacheError::Unavailable)?
        {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        match bincode::deserialize::<CacheEntry>(&bytes) {
            Ok(entry) if entry.matches(key) => {
                tracing::debug!("Structure cache hit for {}", key);
                Ok(Some(entry.into_structure()))
            }
            Ok(_) => {
                tracing::warn!("Ignoring mismatched structure cache entry for {}", key);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt structure cache entry for {}: {}", key, e);
                Ok(None)
            }
        }
    }

    fn build_and_store<F>(&self, key: &CacheKey, build: F) -> Result<GraphStore, CacheError>
    where
        F: FnOnce() -> Result<GraphStore, BuildError>,
    {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.builds.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Structure cache miss for {}, building", key);

        let structure = build()?;
        let bytes = bincode::serialize(&CacheEntry::new(key, &structure))
            .map_err(|e| CacheError::Encode(e.to_string()))?;

        if let Err(e) = with_retry("write", key, || self.store.put(key, &bytes)) {
            tracing::warn!("Could not persist structure for {}: {}", key, e);
        }
        Ok(structure)
    }
}

/// Run a store operation, retrying it once on failure.
fn with_retry<T>(
    op: &str,
    target: impl std::fmt::Display,
    mut f: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    match f() {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!("Structure store {} failed for {}, retrying: {}", op, target, e);
            f()
        }
    }
}
