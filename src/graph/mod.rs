//! Property-graph value types shared by every analyzer.
//!
//! A [`Fragment`] is the (nodes, edges) pair produced for one file. Edges may
//! point at IDs that are not in the same fragment; merging fragments is the
//! job of whatever store consumes the emitted stream.

pub mod schema;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// A code entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier, deterministic for unchanged input.
    pub id: String,

    /// Open tag such as `Function` or `Class`.
    pub label: String,

    /// Arbitrary properties; `name`, `file` and `line` when available.
    pub properties: BTreeMap<String, Value>,
}

impl Node {
    /// Create a node with no properties.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Create a definition node carrying `name`, `file` and `line`.
    pub fn definition(
        id: impl Into<String>,
        label: &str,
        name: &str,
        file: &str,
        line: usize,
    ) -> Self {
        Self::new(id, label)
            .with_property(schema::PROP_NAME, name)
            .with_property(schema::PROP_FILE, file)
            .with_property(schema::PROP_LINE, line)
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Set or replace a property.
    pub fn set_property(&mut self, key: &str, value: impl Into<Value>) {
        self.properties.insert(key.to_string(), value.into());
    }

    /// Look up a property.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// The `name` property, if it is a string.
    pub fn name(&self) -> Option<&str> {
        self.property(schema::PROP_NAME).and_then(Value::as_str)
    }

    /// The `line` property, if present.
    pub fn line(&self) -> Option<u64> {
        self.property(schema::PROP_LINE).and_then(Value::as_u64)
    }
}

/// A directed relationship between two node IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source node ID.
    pub source_id: String,

    /// Target node ID, possibly outside the current fragment.
    pub target_id: String,

    /// Relationship type such as `CALLS`.
    pub edge_type: String,
}

impl Edge {
    /// Create an edge.
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        edge_type: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            edge_type: edge_type.into(),
        }
    }
}

/// Nodes and edges extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Definition nodes in discovery order.
    pub nodes: Vec<Node>,

    /// Relationship edges in discovery order.
    pub edges: Vec<Edge>,
}

impl Fragment {
    /// Find a node by ID.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// All nodes whose `name` property equals `name`.
    pub fn nodes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| n.name() == Some(name))
    }

    /// All edges of the given type.
    pub fn edges_of_type<'a>(&'a self, edge_type: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.edge_type == edge_type)
    }

    /// Whether the fragment has no nodes and no edges.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Accumulates a fragment, dropping duplicate node IDs and duplicate edges.
///
/// The first occurrence wins, so the result only depends on traversal order.
#[derive(Debug, Default)]
pub struct FragmentBuilder {
    fragment: Fragment,
    node_ids: HashSet<String>,
    edge_keys: HashSet<Edge>,
}

impl FragmentBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; returns false if the ID was already present.
    pub fn add_node(&mut self, node: Node) -> bool {
        if !self.node_ids.insert(node.id.clone()) {
            return false;
        }
        self.fragment.nodes.push(node);
        true
    }

    /// Add an edge; exact duplicates are ignored.
    pub fn add_edge(&mut self, source_id: &str, target_id: &str, edge_type: &str) {
        let edge = Edge::new(source_id, target_id, edge_type);
        if self.edge_keys.insert(edge.clone()) {
            self.fragment.edges.push(edge);
        }
    }

    /// Whether a node with this ID has been added.
    pub fn contains_node(&self, id: &str) -> bool {
        self.node_ids.contains(id)
    }

    /// Mutable access to an already-added node.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.fragment.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Copy of everything collected so far.
    pub fn snapshot(&self) -> Fragment {
        self.fragment.clone()
    }

    /// Finish and return the fragment.
    pub fn finish(self) -> Fragment {
        self.fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_node_properties() {
        let node = Node::definition("a.ts:main", schema::LABEL_FUNCTION, "main", "a.ts", 3);
        assert_eq!(node.name(), Some("main"));
        assert_eq!(node.line(), Some(3));
        assert_eq!(
            node.property(schema::PROP_FILE).and_then(Value::as_str),
            Some("a.ts")
        );
    }

    #[test]
    fn test_builder_dedupes_nodes_first_wins() {
        let mut builder = FragmentBuilder::new();
        assert!(builder.add_node(Node::definition("f:x", "Function", "x", "f", 1)));
        assert!(!builder.add_node(Node::definition("f:x", "Function", "x", "f", 9)));

        let fragment = builder.finish();
        assert_eq!(fragment.nodes.len(), 1);
        assert_eq!(fragment.nodes[0].line(), Some(1));
    }

    #[test]
    fn test_builder_dedupes_edges() {
        let mut builder = FragmentBuilder::new();
        builder.add_edge("a", "b", schema::EDGE_CALLS);
        builder.add_edge("a", "b", schema::EDGE_CALLS);
        builder.add_edge("a", "b", schema::EDGE_USES);

        let fragment = builder.finish();
        assert_eq!(fragment.edges.len(), 2);
        assert_eq!(fragment.edges_of_type(schema::EDGE_CALLS).count(), 1);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut builder = FragmentBuilder::new();
        builder.add_node(Node::new("a", "Function"));
        let snap = builder.snapshot();
        builder.add_node(Node::new("b", "Function"));

        assert_eq!(snap.nodes.len(), 1);
        assert_eq!(builder.finish().nodes.len(), 2);
    }
}
