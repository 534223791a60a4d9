//! Differences between a base structure and a transformed one

use crate::graph::GraphStore;
use crate::model::BlockKey;
use serde::{Deserialize, Serialize};

/// What a transformation run changed, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureDiff {
    /// Blocks present before but not after.
    pub removed_blocks: Vec<BlockKey>,
    /// Blocks present after but not before.
    pub added_blocks: Vec<BlockKey>,
    /// Blocks whose child list changed.
    pub rewired_blocks: Vec<BlockKey>,
    /// Blocks whose field map changed.
    pub annotated_blocks: Vec<BlockKey>,
}

impl StructureDiff {
    pub fn between(before: &GraphStore, after: &GraphStore) -> Self {
        let mut diff = StructureDiff::default();

        for old in before.all_nodes() {
            match after.node(&old.key) {
                None => diff.removed_blocks.push(old.key.clone()),
                Some(new) => {
                    // Untouched copy-on-write nodes are still shared.
                    if before.is_shared_with(after, &old.key) {
                        continue;
                    }
                    if new.children != old.children {
                        diff.rewired_blocks.push(old.key.clone());
                    }
                    if new.fields != old.fields {
                        diff.annotated_blocks.push(old.key.clone());
                    }
                }
            }
        }

        diff.added_blocks = after
            .block_keys()
            .filter(|k| !before.contains(k))
            .cloned()
            .collect();

        diff
    }

    /// Check if this diff is empty (no changes).
    pub fn is_empty(&self) -> bool {
        self.removed_blocks.is_empty()
            && self.added_blocks.is_empty()
            && self.rewired_blocks.is_empty()
            && self.annotated_blocks.is_empty()
    }
}
