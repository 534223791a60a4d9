//! The single entry point callers use to get a user's view of a course

use crate::config::BlockGraphConfig;
use crate::source::{CourseSource, SourceError};
use blockgraph_core::{
    BlockKey, BuildError, CacheError, CacheStats, FileStore, GraphBuilder, GraphStore,
    RawDefinition, StructureCache, StructureStore,
};
use blockgraph_transformers::{
    PipelineError, RegistryError, TransformPipeline, TransformerRegistry, UserContext, UserStateStore,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Cache(CacheError),

    #[error("block {0} is not part of the course structure")]
    UnknownBlock(BlockKey),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<CacheError> for AccessError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Build(e) => AccessError::Build(e),
            other => AccessError::Cache(other),
        }
    }
}

/// Cached base structures plus per-request personalization.
///
/// Thread-safe: `get_blocks` may be called from many threads at once.
pub struct BlockAccess {
    source: Arc<dyn CourseSource>,
    cache: StructureCache,
    registry: TransformerRegistry,
    builds: AtomicU64,
}

impl BlockAccess {
    pub fn new(
        source: Arc<dyn CourseSource>,
        store: Arc<dyn StructureStore>,
        registry: TransformerRegistry,
    ) -> Self {
        BlockAccess {
            source,
            cache: StructureCache::new(store),
            registry,
            builds: AtomicU64::new(0),
        }
    }

    /// File-backed cache under the configured directory and a registry in
    /// the configured order.
    pub fn from_config(
        config: &BlockGraphConfig,
        root: &Path,
        source: Arc<dyn CourseSource>,
        user_state: Arc<dyn UserStateStore>,
    ) -> Result<Self, AccessError> {
        let registry = TransformerRegistry::from_config(&config.transformers, user_state)?;
        let store = FileStore::new(config.resolved_cache_dir(root));
        Ok(Self::new(source, Arc::new(store), registry))
    }

    pub fn registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of structures built from source since creation, cached or not.
    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    /// The user's view of the structure rooted at `course_root`, with the
    /// `requested` transformers applied in registry order.
    pub fn get_blocks<S: AsRef<str>>(
        &self,
        user: &UserContext,
        course_root: &BlockKey,
        requested: &[S],
    ) -> Result<GraphStore, AccessError> {
        let mut base = self.base_structure(&user.course_id)?;

        if course_root != base.root() {
            base = base
                .subgraph(course_root)
                .map_err(|_| AccessError::UnknownBlock(course_root.clone()))?;
        }

        if requested.is_empty() {
            return Ok(base);
        }
        let transformers = self.registry.select(requested)?;
        Ok(TransformPipeline::apply(&base, user, &transformers)?)
    }

    /// The cached base structure for the course's current content. Builds
    /// directly, without caching, when the cache store is down.
    ///
    /// The structure is built from the same snapshot that supplied the cache
    /// key, so an entry never holds content newer than its fingerprint.
    pub fn base_structure(&self, course_id: &str) -> Result<GraphStore, AccessError> {
        let snapshot = self.source.snapshot(course_id)?;
        let definition = &snapshot.definition;

        match self
            .cache
            .get_or_build(course_id, &snapshot.fingerprint, || self.build(course_id, definition))
        {
            Err(CacheError::Unavailable(e)) => {
                tracing::warn!(
                    "Structure cache unavailable for {}, building without it: {}",
                    course_id,
                    e
                );
                Ok(self.build(course_id, definition)?)
            }
            other => Ok(other?),
        }
    }

    /// Drop every cached structure of the course, e.g. after it is
    /// republished.
    pub fn invalidate(&self, course_id: &str) -> Result<usize, AccessError> {
        Ok(self.cache.invalidate(course_id)?)
    }

    fn build(&self, course_id: &str, definition: &RawDefinition) -> Result<GraphStore, BuildError> {
        self.builds.fetch_add(1, Ordering::Relaxed);
        let structure = GraphBuilder::build(definition)?;
        tracing::info!(
            "Built structure for {}: {} blocks, {} edges",
            course_id,
            structure.node_count(),
            structure.edge_count()
        );
        Ok(structure)
    }
}
