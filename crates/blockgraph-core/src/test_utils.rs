//! Test fixtures for blockgraph-core

use crate::builder::{ChildDefinition, RawDefinition};
use crate::model::BlockKey;
use serde_json::json;

pub fn key(block_type: &str, block_id: &str) -> BlockKey {
    BlockKey::new(block_type, block_id)
}

/// `course → chapter1 → lesson1 → vertical1 → library_content1 →
/// {vertical2 → html1, vertical3 → html2}`
pub fn library_course() -> RawDefinition {
    RawDefinition::new("course", "course").with_child(
        RawDefinition::new("chapter", "chapter1").with_child(
            RawDefinition::new("sequential", "lesson1").with_child(
                RawDefinition::new("vertical", "vertical1").with_child(
                    RawDefinition::new("library_content", "library_content1")
                        .with_field("category", json!("library_content"))
                        .with_child(
                            RawDefinition::new("vertical", "vertical2")
                                .with_field("display_name", json!("CL Vertical 1"))
                                .with_child(
                                    RawDefinition::new("html", "html1")
                                        .with_field("display_name", json!("HTML1")),
                                ),
                        )
                        .with_child(
                            RawDefinition::new("vertical", "vertical3")
                                .with_field("display_name", json!("CL Vertical 2"))
                                .with_child(
                                    RawDefinition::new("html", "html2")
                                        .with_field("display_name", json!("HTML2")),
                                ),
                        ),
                ),
            ),
        ),
    )
}

/// Set a field on the block `target` anywhere in the tree.
pub fn with_block_field(
    mut def: RawDefinition,
    target: &BlockKey,
    name: &str,
    value: serde_json::Value,
) -> RawDefinition {
    if def.key() == *target {
        def.fields.insert(name.to_string(), value.clone());
    }
    def.children = def
        .children
        .into_iter()
        .map(|child| match child {
            ChildDefinition::Inline(inner) => {
                ChildDefinition::Inline(with_block_field(inner, target, name, value.clone()))
            }
            reference => reference,
        })
        .collect();
    def
}

/// Two verticals sharing one problem through a reference.
pub fn shared_problem_course() -> RawDefinition {
    let problem = key("problem", "p1");
    RawDefinition::new("course", "course").with_child(
        RawDefinition::new("chapter", "ch")
            .with_child(
                RawDefinition::new("vertical", "va")
                    .with_child(RawDefinition::new("problem", "p1"))
                    .with_child(RawDefinition::new("html", "intro")),
            )
            .with_child(RawDefinition::new("vertical", "vb").with_reference(&problem)),
    )
}
