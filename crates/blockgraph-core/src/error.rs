//! Error types for building, validating and caching block structures

use crate::model::BlockKey;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning a raw definition tree into a [`GraphStore`](crate::GraphStore).
/// Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("malformed definition: {0}")]
    MalformedDefinition(String),

    #[error("cycle detected: {}", format_path(.path))]
    CycleDetected { path: Vec<BlockKey> },
}

/// Structural problems found in a [`GraphStore`](crate::GraphStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("root block {0} is missing")]
    MissingRoot(BlockKey),

    #[error("block {parent} lists child {child} which does not exist")]
    DanglingChild { parent: BlockKey, child: BlockKey },

    #[error("block {0} is its own ancestor")]
    Cycle(BlockKey),

    #[error("unknown block {0}")]
    UnknownBlock(BlockKey),
}

/// Backend failures from a [`StructureStore`](crate::StructureStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The store failed twice in a row.
    #[error("structure cache unavailable: {0}")]
    Unavailable(#[source] StoreError),

    #[error("cannot encode cache entry: {0}")]
    Encode(String),
}

pub(crate) fn format_path(path: &[BlockKey]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
