//! The two-phase transformer capability

use crate::context::TransformerContext;
use crate::user_state::UserStateError;
use blockgraph_core::{GraphError, GraphStore};
use thiserror::Error;

/// A collect phase could not gather what its transformer needs.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(transparent)]
    UserState(#[from] UserStateError),

    #[error("{0}")]
    Other(String),
}

/// A pluggable unit that personalizes or annotates a block structure.
///
/// Implementations keep no state between requests; everything a request
/// needs lives in the [`TransformerContext`].
pub trait BlockTransformer: Send + Sync {
    /// Stable name, used for registry lookups and fingerprints.
    fn name(&self) -> &str;

    /// Bumped whenever the transformer's output changes for the same input.
    fn version(&self) -> &str;

    /// Gather data from the pristine base structure. Must not depend on
    /// other transformers' output.
    fn collect(
        &self,
        base: &GraphStore,
        context: &mut TransformerContext,
    ) -> Result<(), CollectionError>;

    /// Mutate the per-request working copy in place. An error here means
    /// the transformer left the structure in a state it cannot repair.
    fn transform(
        &self,
        structure: &mut GraphStore,
        context: &TransformerContext,
    ) -> Result<(), GraphError>;
}
