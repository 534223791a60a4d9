//! Builds a [`GraphStore`] from a raw nested definition tree

use crate::error::BuildError;
use crate::graph::GraphStore;
use crate::model::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One block as handed over by the authoring side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDefinition {
    #[serde(rename = "type")]
    pub block_type: String,
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub children: Vec<ChildDefinition>,
}

/// A child slot: either a nested definition or a reference to a block
/// defined elsewhere in the same tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildDefinition {
    Reference {
        #[serde(rename = "ref")]
        target: BlockRef,
    },
    Inline(RawDefinition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRef {
    #[serde(rename = "type")]
    pub block_type: String,
    pub id: String,
}

impl RawDefinition {
    pub fn new(block_type: impl Into<String>, id: impl Into<String>) -> Self {
        RawDefinition {
            block_type: block_type.into(),
            id: id.into(),
            fields: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_child(mut self, child: RawDefinition) -> Self {
        self.children.push(ChildDefinition::Inline(child));
        self
    }

    /// Add a reference to a block defined elsewhere in the tree.
    pub fn with_reference(mut self, key: &BlockKey) -> Self {
        self.children.push(ChildDefinition::Reference {
            target: BlockRef {
                block_type: key.block_type.clone(),
                id: key.block_id.clone(),
            },
        });
        self
    }

    pub fn key(&self) -> BlockKey {
        BlockKey::new(&self.block_type, &self.id)
    }
}

impl ChildDefinition {
    fn key(&self) -> BlockKey {
        match self {
            ChildDefinition::Reference { target } => BlockKey::new(&target.block_type, &target.id),
            ChildDefinition::Inline(def) => def.key(),
        }
    }
}

/// Walks a definition tree once and produces the base block structure.
pub struct GraphBuilder;

impl GraphBuilder {
    /// Build the structure rooted at `root`. Sibling order follows authoring
    /// order. Nothing is returned on failure.
    pub fn build(root: &RawDefinition) -> Result<GraphStore, BuildError> {
        let definitions = index_definitions(root)?;
        let mut walk = Walk {
            definitions: &definitions,
            path: Vec::new(),
            on_path: HashSet::new(),
            store: GraphStore::new(root.key()),
        };
        walk.visit(root)?;

        tracing::debug!(
            "Built block structure rooted at {}: {} blocks, {} edges",
            root.key(),
            walk.store.node_count(),
            walk.store.edge_count()
        );
        Ok(walk.store)
    }
}

/// Map every inline definition by key, rejecting duplicates and empty keys.
fn index_definitions(root: &RawDefinition) -> Result<HashMap<BlockKey, &RawDefinition>, BuildError> {
    let mut definitions = HashMap::new();
    let mut stack = vec![root];
    while let Some(def) = stack.pop() {
        if def.block_type.is_empty() || def.id.is_empty() {
            return Err(BuildError::MalformedDefinition(format!(
                "block with type {:?} and id {:?} has an empty type or id",
                def.block_type, def.id
            )));
        }
        // `type@id` splits on the first `@`, so only the id may contain one.
        if def.block_type.contains('@') {
            return Err(BuildError::MalformedDefinition(format!(
                "block type {:?} of block {:?} contains '@'",
                def.block_type, def.id
            )));
        }
        if definitions.insert(def.key(), def).is_some() {
            return Err(BuildError::MalformedDefinition(format!(
                "block {} is defined more than once",
                def.key()
            )));
        }
        for child in &def.children {
            if let ChildDefinition::Inline(inner) = child {
                stack.push(inner);
            }
        }
    }
    Ok(definitions)
}

struct Walk<'a> {
    definitions: &'a HashMap<BlockKey, &'a RawDefinition>,
    path: Vec<BlockKey>,
    on_path: HashSet<BlockKey>,
    store: GraphStore,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, def: &'a RawDefinition) -> Result<(), BuildError> {
        let key = def.key();
        let mut child_keys = Vec::with_capacity(def.children.len());
        for child in &def.children {
            let child_key = child.key();
            if !self.definitions.contains_key(&child_key) {
                return Err(BuildError::MalformedDefinition(format!(
                    "block {key} references {child_key}, which is never defined"
                )));
            }
            if child_keys.contains(&child_key) {
                return Err(BuildError::MalformedDefinition(format!(
                    "block {key} lists child {child_key} more than once"
                )));
            }
            child_keys.push(child_key);
        }

        self.path.push(key.clone());
        self.on_path.insert(key.clone());

        for child_key in &child_keys {
            if self.on_path.contains(child_key) {
                let start = self.path.iter().position(|k| k == child_key).unwrap_or(0);
                let mut cycle = self.path[start..].to_vec();
                cycle.push(child_key.clone());
                return Err(BuildError::CycleDetected { path: cycle });
            }
            if self.store.contains(child_key) {
                // Already built through another parent.
                continue;
            }
            let definitions = self.definitions;
            let child_def: &'a RawDefinition = definitions[child_key];
            self.visit(child_def)?;
        }

        self.on_path.remove(&key);
        self.path.pop();

        let mut node = BlockNode::new(key.clone()).with_children(child_keys);
        for (name, value) in &def.fields {
            node.fields.insert(name.clone(), FieldValue::from_json(value));
        }
        node.fields
            .entry(FIELD_CATEGORY.to_string())
            .or_insert_with(|| FieldValue::Text(key.block_type.clone()));
        node.fields
            .entry(FIELD_DISPLAY_NAME.to_string())
            .or_insert_with(|| FieldValue::Text(key.block_id.clone()));
        self.store.insert(node);
        Ok(())
    }
}

/// SHA-256 fingerprint of a definition tree, for authoring collaborators
/// that do not keep a version counter.
pub fn definition_fingerprint(root: &RawDefinition) -> String {
    fn feed(hasher: &mut Sha256, def: &RawDefinition) {
        hasher.update(def.block_type.as_bytes());
        hasher.update([0u8]);
        hasher.update(def.id.as_bytes());
        hasher.update([0u8]);
        for (name, value) in &def.fields {
            hasher.update(name.as_bytes());
            hasher.update([b'=']);
            hasher.update(value.to_string().as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([b'[']);
        for child in &def.children {
            match child {
                ChildDefinition::Inline(inner) => feed(hasher, inner),
                ChildDefinition::Reference { target } => {
                    hasher.update(b"ref:");
                    hasher.update(target.block_type.as_bytes());
                    hasher.update([b'@']);
                    hasher.update(target.id.as_bytes());
                    hasher.update([0u8]);
                }
            }
        }
        hasher.update([b']']);
    }

    let mut hasher = Sha256::new();
    feed(&mut hasher, root);
    format!("{:x}", hasher.finalize())
}
