//! Resolved selections: which entry and rank each node carries

pub mod hero;
pub mod parse;

pub use hero::detect_hero_choice;
pub use parse::{parse_talent_string, ParsedLoadout, TalentToken};

use crate::core::types::{EntryId, NodeId, TalentId};
use ahash::AHashMap;
use tracing::warn;

/// The choice made at one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub entry_id: EntryId,
    pub rank: u32,
    /// Talent name this came from, for diagnostics
    pub name: String,
}

/// Node id → selection for one loadout
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    nodes: AHashMap<NodeId, ResolvedSelection>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a selection; a later selection for the same node replaces the earlier one
    pub fn insert(&mut self, node_id: NodeId, selection: ResolvedSelection) {
        if let Some(previous) = self.nodes.get(&node_id) {
            if previous.name != selection.name || previous.entry_id != selection.entry_id {
                warn!(
                    node_id,
                    replaced = %previous.name,
                    by = %selection.name,
                    "Two talents resolve to the same node, keeping the later one"
                );
            }
        }
        self.nodes.insert(node_id, selection);
    }

    /// Merge tokens in order against resolved identities
    ///
    /// Tokens whose name is missing from `resolved` are skipped; callers fail
    /// the loadout before getting here if any name did not resolve.
    pub fn from_tokens<'a>(
        tokens: impl IntoIterator<Item = &'a TalentToken>,
        resolved: &AHashMap<String, TalentId>,
    ) -> Self {
        let mut set = Self::new();
        for token in tokens {
            if let Some(id) = resolved.get(&token.name) {
                set.insert(
                    id.node_id,
                    ResolvedSelection {
                        entry_id: id.entry_id,
                        rank: token.rank,
                        name: token.name.clone(),
                    },
                );
            }
        }
        set
    }

    pub fn get(&self, node_id: NodeId) -> Option<&ResolvedSelection> {
        self.nodes.get(&node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
