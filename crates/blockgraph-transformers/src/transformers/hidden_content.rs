//! Removes staff-only blocks for learners

use crate::context::TransformerContext;
use crate::transformer::{BlockTransformer, CollectionError};
use blockgraph_core::{BlockKey, FieldValue, GraphError, GraphStore};
use std::collections::BTreeSet;

pub const HIDDEN_CONTENT: &str = "hidden_content";

pub const FIELD_STAFF_ONLY: &str = "visible_to_staff_only";

#[derive(Default)]
pub struct HiddenContentTransformer;

impl HiddenContentTransformer {
    pub fn new() -> Self {
        HiddenContentTransformer
    }
}

impl BlockTransformer for HiddenContentTransformer {
    fn name(&self) -> &str {
        HIDDEN_CONTENT
    }

    fn version(&self) -> &str {
        "1"
    }

    fn collect(
        &self,
        base: &GraphStore,
        context: &mut TransformerContext,
    ) -> Result<(), CollectionError> {
        let hidden: BTreeSet<BlockKey> = if context.user().is_staff {
            BTreeSet::new()
        } else {
            base.all_nodes()
                .filter(|n| n.field(FIELD_STAFF_ONLY).and_then(FieldValue::as_bool) == Some(true))
                .map(|n| n.key.clone())
                .collect()
        };
        context.insert(HIDDEN_CONTENT, hidden);
        Ok(())
    }

    fn transform(
        &self,
        structure: &mut GraphStore,
        context: &TransformerContext,
    ) -> Result<(), GraphError> {
        let Some(hidden) = context.get::<BTreeSet<BlockKey>>(HIDDEN_CONTENT) else {
            return Ok(());
        };
        for key in hidden {
            if key == structure.root() {
                tracing::warn!("Root block {} is marked staff-only; leaving it in place", key);
                continue;
            }
            for parent in structure.parents(key) {
                structure.remove_child(&parent, key);
            }
        }

        let removed = structure.prune_unreachable();
        if !removed.is_empty() {
            tracing::debug!("Hid {} block(s) from {}", removed.len(), context.user().user_id);
        }
        Ok(())
    }
}
