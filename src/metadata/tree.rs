//! Typed talent tree definitions
//!
//! The dataset is dynamic JSON. It is mapped onto these records once, at the
//! load boundary, so the encoder never performs dynamic lookups.

use crate::core::types::{EntryId, NodeId};
use ahash::AHashMap;
use serde::Deserialize;

/// Kind of a tree node, which decides whether a choice payload is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Single,
    Choice,
    Subtree,
}

impl NodeType {
    pub fn has_choice(self) -> bool {
        matches!(self, NodeType::Choice | NodeType::Subtree)
    }
}

/// One concrete option at a node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entry {
    pub id: EntryId,
}

/// One slot in the tree
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub max_ranks: u32,
    /// Only present in the dataset when true
    #[serde(default)]
    pub free_node: bool,
    pub entries: Vec<Entry>,
}

impl Node {
    /// Position of `entry_id` among this node's entries
    pub fn entry_index(&self, entry_id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == entry_id)
    }
}

/// Which of the four node collections a node came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeGroup {
    Class,
    Spec,
    Hero,
    SubTree,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTree {
    spec_id: u32,
    spec_name: String,
    class_name: String,
    full_node_order: Vec<NodeId>,
    class_nodes: Vec<Node>,
    spec_nodes: Vec<Node>,
    hero_nodes: Vec<Node>,
    sub_tree_nodes: Vec<Node>,
}

/// A full talent tree for one specialization
///
/// Immutable once built; shared read-only by every encode for that spec.
#[derive(Debug, Clone)]
pub struct TreeDefinition {
    pub spec_id: u32,
    pub spec_name: String,
    pub class_name: String,
    /// Canonical serialization order; never re-sorted
    pub full_node_order: Vec<NodeId>,
    pub class_nodes: Vec<Node>,
    pub spec_nodes: Vec<Node>,
    pub hero_nodes: Vec<Node>,
    pub sub_tree_nodes: Vec<Node>,
    index: AHashMap<NodeId, (NodeGroup, usize)>,
}

impl TreeDefinition {
    /// Build from the four collections; earlier collections win on id clashes
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spec_id: u32,
        spec_name: impl Into<String>,
        class_name: impl Into<String>,
        full_node_order: Vec<NodeId>,
        class_nodes: Vec<Node>,
        spec_nodes: Vec<Node>,
        hero_nodes: Vec<Node>,
        sub_tree_nodes: Vec<Node>,
    ) -> Self {
        let mut tree = Self {
            spec_id,
            spec_name: spec_name.into(),
            class_name: class_name.into(),
            full_node_order,
            class_nodes,
            spec_nodes,
            hero_nodes,
            sub_tree_nodes,
            index: AHashMap::new(),
        };
        tree.build_index();
        tree
    }

    /// Parse one tree from the dataset; any missing or ill-typed field fails
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        let raw = RawTree::deserialize(value).map_err(|e| e.to_string())?;

        for node in raw
            .class_nodes
            .iter()
            .chain(&raw.spec_nodes)
            .chain(&raw.hero_nodes)
            .chain(&raw.sub_tree_nodes)
        {
            if node.max_ranks == 0 {
                return Err(format!("node {} has maxRanks 0", node.id));
            }
        }

        Ok(Self::new(
            raw.spec_id,
            raw.spec_name,
            raw.class_name,
            raw.full_node_order,
            raw.class_nodes,
            raw.spec_nodes,
            raw.hero_nodes,
            raw.sub_tree_nodes,
        ))
    }

    fn build_index(&mut self) {
        let groups = [
            (NodeGroup::Class, &self.class_nodes),
            (NodeGroup::Spec, &self.spec_nodes),
            (NodeGroup::Hero, &self.hero_nodes),
            (NodeGroup::SubTree, &self.sub_tree_nodes),
        ];
        let mut index = AHashMap::new();
        for (group, nodes) in groups {
            for (i, node) in nodes.iter().enumerate() {
                index.entry(node.id).or_insert((group, i));
            }
        }
        self.index = index;
    }

    /// Find a node across all four collections
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        let &(group, i) = self.index.get(&id)?;
        let nodes = match group {
            NodeGroup::Class => &self.class_nodes,
            NodeGroup::Spec => &self.spec_nodes,
            NodeGroup::Hero => &self.hero_nodes,
            NodeGroup::SubTree => &self.sub_tree_nodes,
        };
        nodes.get(i)
    }

    pub fn node_group(&self, id: NodeId) -> Option<NodeGroup> {
        self.index.get(&id).map(|&(group, _)| group)
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }
}
