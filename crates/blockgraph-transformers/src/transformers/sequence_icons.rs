//! Annotates blocks with the icon class shown in course navigation

use crate::context::TransformerContext;
use crate::transformer::{BlockTransformer, CollectionError};
use blockgraph_core::{FieldValue, GraphError, GraphStore};
use std::collections::HashSet;

pub const SEQUENCE_ICONS: &str = "sequence_icons";

pub const FIELD_ICON_CLASS: &str = "icon_class";

pub const ICON_OTHER: &str = "other";

/// Leaves take their category as icon class when it is ranked; parents take
/// the highest-ranked class among their children. Everything else is
/// [`ICON_OTHER`].
pub struct SequenceIconsTransformer {
    /// Lowest rank first.
    class_priority: Vec<String>,
}

impl SequenceIconsTransformer {
    pub fn new(class_priority: Vec<String>) -> Self {
        SequenceIconsTransformer { class_priority }
    }
}

impl BlockTransformer for SequenceIconsTransformer {
    fn name(&self) -> &str {
        SEQUENCE_ICONS
    }

    fn version(&self) -> &str {
        "1"
    }

    fn collect(
        &self,
        _base: &GraphStore,
        _context: &mut TransformerContext,
    ) -> Result<(), CollectionError> {
        // Icons depend on what is left after earlier transforms.
        Ok(())
    }

    fn transform(
        &self,
        structure: &mut GraphStore,
        _context: &TransformerContext,
    ) -> Result<(), GraphError> {
        let order = structure.topological_order()?;

        for key in order.iter().rev() {
            let Some(node) = structure.node(key) else {
                continue;
            };
            let icon = if node.children.is_empty() {
                let category = node.category();
                if self.class_priority.iter().any(|c| c == category) {
                    category.to_string()
                } else {
                    ICON_OTHER.to_string()
                }
            } else {
                let child_classes: HashSet<&str> = node
                    .children
                    .iter()
                    .filter_map(|c| structure.field(c, FIELD_ICON_CLASS))
                    .filter_map(FieldValue::as_text)
                    .collect();
                self.class_priority
                    .iter()
                    .rev()
                    .find(|c| child_classes.contains(c.as_str()))
                    .cloned()
                    .unwrap_or_else(|| ICON_OTHER.to_string())
            };
            structure.set_field(key, FIELD_ICON_CLASS, icon)?;
        }
        Ok(())
    }
}
