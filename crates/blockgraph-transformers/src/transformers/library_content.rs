//! Library content: each user sees a stable subset of a container's children
//!
//! A container is any block whose category is `library_content`. Recorded
//! selections from the user-state service win over fresh ones; stale entries
//! in a record (children that no longer exist) are dropped silently. A fresh
//! selection is drawn from a PRNG seeded by the user and the container key,
//! so the same user always gets the same children for unchanged content.

use crate::context::TransformerContext;
use crate::transformer::{BlockTransformer, CollectionError};
use crate::user_state::{SelectionRecord, UserStateStore};
use blockgraph_core::{BlockKey, BlockNode, FieldValue, GraphError, GraphStore, UserId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const LIBRARY_CONTENT: &str = "library_content";

/// Number of children to show; zero or negative shows all.
pub const FIELD_MAX_COUNT: &str = "max_count";

pub struct LibraryContentTransformer {
    user_state: Arc<dyn UserStateStore>,
    default_max_count: u32,
}

/// What collect gathers for the transform phase.
#[derive(Debug)]
struct Collected {
    containers: Vec<BlockKey>,
    recorded: SelectionRecord,
}

impl LibraryContentTransformer {
    pub fn new(user_state: Arc<dyn UserStateStore>, default_max_count: u32) -> Self {
        LibraryContentTransformer {
            user_state,
            default_max_count,
        }
    }

    /// How many children `container` shows, or `None` for all of them.
    fn selection_size(&self, container: &BlockNode) -> Option<usize> {
        let count = container
            .field(FIELD_MAX_COUNT)
            .and_then(FieldValue::as_int)
            .unwrap_or(i64::from(self.default_max_count));
        usize::try_from(count).ok().filter(|&n| n > 0)
    }
}

impl BlockTransformer for LibraryContentTransformer {
    fn name(&self) -> &str {
        LIBRARY_CONTENT
    }

    fn version(&self) -> &str {
        "1"
    }

    fn collect(
        &self,
        base: &GraphStore,
        context: &mut TransformerContext,
    ) -> Result<(), CollectionError> {
        let user = context.user();
        let recorded = self.user_state.selections(&user.user_id, &user.course_id)?;
        let containers: Vec<BlockKey> = base.blocks_of_category(LIBRARY_CONTENT).cloned().collect();

        tracing::debug!(
            "Library content for {} in {}: {} container(s), {} recorded selection(s)",
            user.user_id,
            user.course_id,
            containers.len(),
            recorded.containers().count()
        );
        context.insert(LIBRARY_CONTENT, Collected { containers, recorded });
        Ok(())
    }

    fn transform(
        &self,
        structure: &mut GraphStore,
        context: &TransformerContext,
    ) -> Result<(), GraphError> {
        let Some(collected) = context.get::<Collected>(LIBRARY_CONTENT) else {
            return Ok(());
        };
        let user = &context.user().user_id;

        for container in &collected.containers {
            // An earlier transformer may have removed it.
            let Some(node) = structure.node(container) else {
                continue;
            };
            let children = node.children.clone();
            let limit = self.selection_size(node).unwrap_or(children.len());

            let selected = match collected.recorded.get(container) {
                Some(recorded) => {
                    let kept = recorded_selection(recorded, &children, limit);
                    if kept.is_empty() {
                        fresh_selection(user, container, &children, limit)
                    } else {
                        kept
                    }
                }
                None => fresh_selection(user, container, &children, limit),
            };

            tracing::debug!(
                "Selected {}/{} children of {} for {}",
                selected.len(),
                children.len(),
                container,
                user
            );
            if selected != children {
                structure.set_children(container, selected)?;
            }
        }

        structure.prune_unreachable();
        Ok(())
    }
}

/// Recorded children still present under the container, capped at `limit`,
/// in authoring order.
fn recorded_selection(recorded: &[BlockKey], children: &[BlockKey], limit: usize) -> Vec<BlockKey> {
    let mut kept: Vec<&BlockKey> = Vec::with_capacity(limit);
    for key in recorded {
        if kept.len() == limit {
            break;
        }
        if children.contains(key) && !kept.contains(&key) {
            kept.push(key);
        }
    }
    children
        .iter()
        .filter(|c| kept.contains(c))
        .cloned()
        .collect()
}

/// Deterministic pseudo-random pick of `limit` children, in authoring order.
fn fresh_selection(
    user: &UserId,
    container: &BlockKey,
    children: &[BlockKey],
    limit: usize,
) -> Vec<BlockKey> {
    let amount = limit.min(children.len());
    if amount == children.len() {
        return children.to_vec();
    }
    // ChaCha8 output is fixed across `rand` releases; `StdRng` output is not.
    let mut rng = ChaCha8Rng::seed_from_u64(selection_seed(user, container));
    let mut picked = rand::seq::index::sample(&mut rng, children.len(), amount).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| children[i].clone()).collect()
}

pub(crate) fn selection_seed(user: &UserId, container: &BlockKey) -> u64 {
    let digest = Sha256::new()
        .chain_update(user.as_str().as_bytes())
        .chain_update([0u8])
        .chain_update(container.to_string().as_bytes())
        .finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed)
}
