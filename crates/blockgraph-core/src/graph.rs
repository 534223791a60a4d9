//! Block structure container: nodes keyed by [`BlockKey`] with ordered child edges

use crate::error::GraphError;
use crate::model::*;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// The block structure: a DAG of blocks with a designated root.
///
/// Nodes sit behind `Arc`, so cloning a store only copies pointers and a node
/// is duplicated the first time it is mutated through [`GraphStore::node_mut`].
#[derive(Clone, PartialEq)]
pub struct GraphStore {
    root: BlockKey,
    nodes: BTreeMap<BlockKey, Arc<BlockNode>>,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("root", &self.root)
            .field("node_count", &self.node_count())
            .field("edge_count", &self.edge_count())
            .finish()
    }
}

impl GraphStore {
    /// Create an empty store whose root is `root`. The root node itself still
    /// has to be inserted.
    pub fn new(root: BlockKey) -> Self {
        GraphStore {
            root,
            nodes: BTreeMap::new(),
        }
    }

    /// Assemble a store from a flat node list (e.g. a deserialized cache entry).
    pub fn from_nodes(root: BlockKey, nodes: impl IntoIterator<Item = BlockNode>) -> Self {
        let mut store = GraphStore::new(root);
        for node in nodes {
            store.insert(node);
        }
        store
    }

    pub fn root(&self) -> &BlockKey {
        &self.root
    }

    /// Insert or replace a node.
    pub fn insert(&mut self, node: BlockNode) {
        self.nodes.insert(node.key.clone(), Arc::new(node));
    }

    pub fn node(&self, key: &BlockKey) -> Option<&BlockNode> {
        self.nodes.get(key).map(Arc::as_ref)
    }

    /// Mutable access to a node, copying it first if it is shared with
    /// another store.
    pub fn node_mut(&mut self, key: &BlockKey) -> Option<&mut BlockNode> {
        self.nodes.get_mut(key).map(Arc::make_mut)
    }

    pub fn contains(&self, key: &BlockKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// True when both stores hold the very same allocation for `key`.
    pub fn is_shared_with(&self, other: &GraphStore, key: &BlockKey) -> bool {
        match (self.nodes.get(key), other.nodes.get(key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.children.len()).sum()
    }

    /// Block keys in key order.
    pub fn block_keys(&self) -> impl Iterator<Item = &BlockKey> {
        self.nodes.keys()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &BlockNode> {
        self.nodes.values().map(Arc::as_ref)
    }

    /// Children of `key` in authoring order (empty for unknown keys).
    pub fn children(&self, key: &BlockKey) -> &[BlockKey] {
        self.nodes
            .get(key)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Parents of `key`, derived by reverse-edge lookup.
    pub fn parents(&self, key: &BlockKey) -> Vec<BlockKey> {
        self.nodes
            .values()
            .filter(|n| n.children.contains(key))
            .map(|n| n.key.clone())
            .collect()
    }

    /// All blocks whose category matches.
    pub fn blocks_of_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a BlockKey> + 'a {
        self.nodes
            .values()
            .filter(move |n| n.category() == category)
            .map(|n| &n.key)
    }

    pub fn field(&self, key: &BlockKey, name: &str) -> Option<&FieldValue> {
        self.node(key).and_then(|n| n.field(name))
    }

    pub fn set_field(
        &mut self,
        key: &BlockKey,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<(), GraphError> {
        let node = self
            .node_mut(key)
            .ok_or_else(|| GraphError::UnknownBlock(key.clone()))?;
        node.fields.insert(name.into(), value.into());
        Ok(())
    }

    /// Replace the child list of `key`.
    pub fn set_children(&mut self, key: &BlockKey, children: Vec<BlockKey>) -> Result<(), GraphError> {
        let node = self
            .node_mut(key)
            .ok_or_else(|| GraphError::UnknownBlock(key.clone()))?;
        node.children = children;
        Ok(())
    }

    /// Detach `child` from `parent`. Returns whether an edge was removed.
    pub fn remove_child(&mut self, parent: &BlockKey, child: &BlockKey) -> bool {
        if !self.children(parent).contains(child) {
            return false;
        }
        match self.node_mut(parent) {
            Some(node) => {
                node.children.retain(|c| c != child);
                true
            }
            None => false,
        }
    }

    /// Remove a node and every edge pointing at it. Its own children are left
    /// in place; call [`GraphStore::prune_unreachable`] to drop orphans.
    pub fn remove_block(&mut self, key: &BlockKey) -> Option<BlockNode> {
        let removed = self.nodes.remove(key)?;
        for parent in self.parents(key) {
            self.remove_child(&parent, key);
        }
        Some(Arc::unwrap_or_clone(removed))
    }

    /// Keys reachable from the root by following child edges.
    pub fn reachable_from_root(&self) -> HashSet<BlockKey> {
        self.reachable_from(&self.root)
    }

    fn reachable_from(&self, start: &BlockKey) -> HashSet<BlockKey> {
        let mut seen = HashSet::new();
        if !self.contains(start) {
            return seen;
        }
        let mut queue = VecDeque::from([start.clone()]);
        seen.insert(start.clone());
        while let Some(current) = queue.pop_front() {
            for child in self.children(&current) {
                if self.contains(child) && seen.insert(child.clone()) {
                    queue.push_back(child.clone());
                }
            }
        }
        seen
    }

    /// Drop every node that can no longer be reached from the root.
    /// Returns the removed keys in key order.
    pub fn prune_unreachable(&mut self) -> Vec<BlockKey> {
        let reachable = self.reachable_from_root();
        let removed: Vec<BlockKey> = self
            .nodes
            .keys()
            .filter(|k| !reachable.contains(*k))
            .cloned()
            .collect();
        for key in &removed {
            self.nodes.remove(key);
        }
        removed
    }

    /// A store containing only `key` and its descendants, rooted at `key`.
    /// Nodes stay shared with `self`.
    pub fn subgraph(&self, key: &BlockKey) -> Result<GraphStore, GraphError> {
        if !self.contains(key) {
            return Err(GraphError::UnknownBlock(key.clone()));
        }
        let keep = self.reachable_from(key);
        Ok(GraphStore {
            root: key.clone(),
            nodes: self
                .nodes
                .iter()
                .filter(|(k, _)| keep.contains(*k))
                .map(|(k, n)| (k.clone(), Arc::clone(n)))
                .collect(),
        })
    }

    /// Parents-before-children ordering of every node.
    pub fn topological_order(&self) -> Result<Vec<BlockKey>, GraphError> {
        let graph = self.to_petgraph()?;
        toposort(&graph, None)
            .map(|order| order.into_iter().map(|idx| graph[idx].clone()).collect())
            .map_err(|cycle| GraphError::Cycle(graph[cycle.node_id()].clone()))
    }

    /// Check the structural invariants: the root exists, every child edge
    /// resolves and no block is its own ancestor.
    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.contains(&self.root) {
            return Err(GraphError::MissingRoot(self.root.clone()));
        }
        self.topological_order().map(|_| ())
    }

    fn to_petgraph(&self) -> Result<DiGraph<BlockKey, ()>, GraphError> {
        let mut graph = DiGraph::with_capacity(self.node_count(), self.edge_count());
        let mut index: HashMap<&BlockKey, NodeIndex> = HashMap::with_capacity(self.node_count());
        for key in self.nodes.keys() {
            index.insert(key, graph.add_node(key.clone()));
        }
        for node in self.nodes.values() {
            let source = index[&node.key];
            for child in &node.children {
                let target = index.get(child).ok_or_else(|| GraphError::DanglingChild {
                    parent: node.key.clone(),
                    child: child.clone(),
                })?;
                graph.add_edge(source, *target, ());
            }
        }
        Ok(graph)
    }
}
