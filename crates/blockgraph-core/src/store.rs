//! Key-value backends for cached block structures

use crate::error::StoreError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Cache directory: .blockgraph/
pub const CACHE_DIR: &str = ".blockgraph";

/// Get cache directory path
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

/// Cache key: one course at one content version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub course_id: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(course_id: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        CacheKey {
            course_id: course_id.into(),
            fingerprint: fingerprint.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.course_id, self.fingerprint)
    }
}

/// Durable get/put/delete contract the structure cache is written against.
pub trait StructureStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<(), StoreError>;

    /// Delete every entry of a course regardless of fingerprint.
    /// Returns how many entries were removed.
    fn delete_course(&self, course_id: &str) -> Result<usize, StoreError>;
}

/// In-process store. Thread-safe for concurrent access.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<CacheKey, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StructureStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).map(|r| r.value().clone()))
    }

    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn delete_course(&self, course_id: &str) -> Result<usize, StoreError> {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = key.course_id != course_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

/// Filesystem store: `<root>/<sha256(course)>/<sha256(fingerprint)>.bin`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn course_dir(&self, course_id: &str) -> PathBuf {
        self.root.join(hex_digest(course_id))
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.course_dir(&key.course_id)
            .join(format!("{}.bin", hex_digest(&key.fingerprint)))
    }

    /// Remove the whole cache directory.
    pub fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.root, e)),
        }
    }
}

impl StructureStore for FileStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.entry_path(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<(), StoreError> {
        let dir = self.course_dir(&key.course_id);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        // Write then rename so readers never observe a half-written entry.
        let path = self.entry_path(key);
        let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
        std::fs::write(&tmp, value).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        tracing::debug!("Structure cache entry written: {}", path.display());
        Ok(())
    }

    fn delete_course(&self, course_id: &str) -> Result<usize, StoreError> {
        let dir = self.course_dir(course_id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };
        let count = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "bin"))
            .count();
        std::fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(count)
    }
}

fn hex_digest(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}
