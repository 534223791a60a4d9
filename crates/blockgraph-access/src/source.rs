//! Where course definitions and their content fingerprints come from

use blockgraph_core::{RawDefinition, definition_fingerprint};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unknown course {0}")]
    UnknownCourse(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid definition in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A course definition together with the fingerprint of exactly that
/// content.
#[derive(Debug, Clone)]
pub struct CourseSnapshot {
    pub fingerprint: String,
    pub definition: Arc<RawDefinition>,
}

/// The authoring side. A fingerprint changes whenever the course content
/// changes, so it can key the structure cache.
pub trait CourseSource: Send + Sync {
    /// Fingerprint and definition taken from one read of the course.
    fn snapshot(&self, course_id: &str) -> Result<CourseSnapshot, SourceError>;

    fn fingerprint(&self, course_id: &str) -> Result<String, SourceError> {
        Ok(self.snapshot(course_id)?.fingerprint)
    }
}

/// In-process courses with a publish counter as fingerprint.
#[derive(Default)]
pub struct MemoryCourseSource {
    courses: DashMap<String, (u64, Arc<RawDefinition>)>,
}

impl MemoryCourseSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new version of a course. Returns the new version number.
    pub fn publish(&self, course_id: impl Into<String>, definition: RawDefinition) -> u64 {
        let definition = Arc::new(definition);
        let mut entry = self
            .courses
            .entry(course_id.into())
            .or_insert_with(|| (0, Arc::clone(&definition)));
        let (version, current) = entry.value_mut();
        *version += 1;
        *current = definition;
        *version
    }
}

impl CourseSource for MemoryCourseSource {
    fn fingerprint(&self, course_id: &str) -> Result<String, SourceError> {
        self.courses
            .get(course_id)
            .map(|c| format!("v{}", c.value().0))
            .ok_or_else(|| SourceError::UnknownCourse(course_id.to_string()))
    }

    fn snapshot(&self, course_id: &str) -> Result<CourseSnapshot, SourceError> {
        let course = self
            .courses
            .get(course_id)
            .ok_or_else(|| SourceError::UnknownCourse(course_id.to_string()))?;
        let (version, definition) = course.value();
        Ok(CourseSnapshot {
            fingerprint: format!("v{}", version),
            definition: Arc::clone(definition),
        })
    }
}

/// One course read from a JSON definition file. The fingerprint is a hash
/// of the parsed definition, so reformatting the file does not invalidate.
pub struct JsonFileSource {
    course_id: String,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(course_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        JsonFileSource {
            course_id: course_id.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self, course_id: &str) -> Result<RawDefinition, SourceError> {
        if course_id != self.course_id {
            return Err(SourceError::UnknownCourse(course_id.to_string()));
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl CourseSource for JsonFileSource {
    fn snapshot(&self, course_id: &str) -> Result<CourseSnapshot, SourceError> {
        let definition = self.read(course_id)?;
        Ok(CourseSnapshot {
            fingerprint: definition_fingerprint(&definition),
            definition: Arc::new(definition),
        })
    }
}
