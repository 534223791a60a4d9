//! Blockgraph Core — block structure model, builder, diff and structure cache

pub mod builder;
pub mod cache;
pub mod diff;
pub mod error;
pub mod graph;
pub mod model;
pub mod store;


#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use builder::{BlockRef, ChildDefinition, GraphBuilder, RawDefinition, definition_fingerprint};
pub use cache::{CACHE_FORMAT_VERSION, CacheEntry, CacheStats, StructureCache};
pub use diff::StructureDiff;
pub use error::{BuildError, CacheError, GraphError, StoreError};
pub use graph::GraphStore;
pub use model::{
    BlockKey, BlockNode, FIELD_CATEGORY, FIELD_DISPLAY_NAME, FieldValue, ParseBlockKeyError, UserId,
};
pub use store::{CACHE_DIR, CacheKey, FileStore, MemoryStore, StructureStore, cache_dir};
