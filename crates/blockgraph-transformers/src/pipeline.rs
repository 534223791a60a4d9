//! Two-phase collect/transform pipeline

use crate::context::{TransformerContext, UserContext};
use crate::transformer::{BlockTransformer, CollectionError};
use blockgraph_core::{GraphStore, StructureDiff};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A collect phase failed; nothing was personalized.
    #[error("transformer {transformer} failed to collect: {source}")]
    Collection {
        transformer: String,
        #[source]
        source: CollectionError,
    },

    /// A transform phase broke the structure. Always a transformer bug.
    #[error("transformer {transformer} broke the block structure: {reason}")]
    InvariantViolation { transformer: String, reason: String },
}

pub struct TransformPipeline;

impl TransformPipeline {
    /// Personalize `base` for `user`.
    ///
    /// Every collect phase runs first, against the untouched base. Then the
    /// base is cloned (nodes are shared until mutated) and each transform
    /// runs in order on the copy. The structure is validated after every
    /// transform. `base` is never modified.
    pub fn apply(
        base: &GraphStore,
        user: &UserContext,
        transformers: &[Arc<dyn BlockTransformer>],
    ) -> Result<GraphStore, PipelineError> {
        let mut context = TransformerContext::new(user.clone());

        for transformer in transformers {
            transformer
                .collect(base, &mut context)
                .map_err(|source| PipelineError::Collection {
                    transformer: transformer.name().to_string(),
                    source,
                })?;
        }

        let mut working = base.clone();
        for transformer in transformers {
            let violation = |reason: String| PipelineError::InvariantViolation {
                transformer: transformer.name().to_string(),
                reason,
            };
            transformer
                .transform(&mut working, &context)
                .map_err(|e| violation(e.to_string()))?;
            working.validate().map_err(|e| violation(e.to_string()))?;
        }

        let orphans = working.prune_unreachable();
        if !orphans.is_empty() {
            tracing::debug!("Pruned {} orphaned block(s) after transforms", orphans.len());
        }

        let diff = StructureDiff::between(base, &working);
        tracing::debug!(
            "Personalized {} for {}: {} removed, {} rewired, {} annotated",
            user.course_id,
            user.user_id,
            diff.removed_blocks.len(),
            diff.rewired_blocks.len(),
            diff.annotated_blocks.len()
        );
        Ok(working)
    }
}
