//! Blockgraph Access — the façade that serves personalized block structures
//!
//! Resolves a course's content fingerprint, fetches (or builds and caches)
//! the base structure, and runs the requested transformers for one user.

pub mod access;
pub mod config;
pub mod source;

#[cfg(test)]
pub mod tests;

pub use access::{AccessError, BlockAccess};
pub use config::{BlockGraphConfig, CONFIG_FILE, ConfigError};
pub use source::{CourseSnapshot, CourseSource, JsonFileSource, MemoryCourseSource, SourceError};
