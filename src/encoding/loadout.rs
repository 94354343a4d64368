//! Loadout export string encoder
//!
//! Produces the in-game talent import/export format, version 2. Field widths
//! are fixed by the game client's ClassTalentImportExport and must not drift.
//!
//! Layout:
//! ```text
//! header: version(8) spec_id(16) tree_hash(128, zero-filled)
//! per node in fullNodeOrder:
//!   selected(1)
//!   └─ purchased(1)                      (0 for free nodes, stop)
//!      ├─ partial(1) [rank(6)]           (rank only when below maxRanks)
//!      └─ choice(1)  [index(2)]          (index only for choice/subtree)
//! ```
//! The tree hash cannot be computed outside the client, so it is written as
//! zeros; the client skips validation for an all-zero hash.

use crate::core::config::ClassProfile;
use crate::core::types::{HeroChoice, NodeId};
use crate::encoding::bit_writer::BitWriter;
use crate::metadata::tree::{Node, TreeDefinition};
use crate::selection::SelectionSet;
use tracing::trace;

pub const SERIALIZATION_VERSION: u64 = 2;
pub const VERSION_BITS: u32 = 8;
pub const SPEC_BITS: u32 = 16;
pub const TREE_HASH_BITS: u32 = 128;
pub const RANK_BITS: u32 = 6;
pub const CHOICE_BITS: u32 = 2;

/// What the encoder decided for one node before writing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeState {
    rank: u32,
    choice_index: u64,
}

/// Stateless encoder configured with the class's hero-tree wiring
#[derive(Debug, Clone)]
pub struct LoadoutEncoder {
    profile: ClassProfile,
}

impl LoadoutEncoder {
    pub fn new(profile: ClassProfile) -> Self {
        Self { profile }
    }

    /// The minimal "nothing selected" string
    pub fn encode_empty() -> String {
        let mut w = BitWriter::new();
        w.put(1, 0);
        w.finish()
    }

    /// Encode a loadout against `tree`
    ///
    /// Nodes are visited strictly in `tree.full_node_order`; each id is looked
    /// up once. `hero` sets the choice of the spec's hero-tree selector node.
    pub fn encode(&self, tree: &TreeDefinition, selections: &SelectionSet, hero: HeroChoice) -> String {
        if selections.is_empty() {
            return Self::encode_empty();
        }

        let mut w = BitWriter::new();
        w.put(VERSION_BITS, SERIALIZATION_VERSION);
        w.put(SPEC_BITS, u64::from(tree.spec_id));
        w.put(TREE_HASH_BITS, 0);

        let selector = self.profile.hero_selector_node(&tree.spec_name);

        for &node_id in &tree.full_node_order {
            let Some(node) = tree.node(node_id) else {
                trace!(node_id, "node not in tree, placeholder bit");
                w.put_flag(false);
                continue;
            };

            let state = Self::node_state(node, selections, selector, hero);
            self.write_node(&mut w, node, state);
        }

        w.finish()
    }

    fn node_state(
        node: &Node,
        selections: &SelectionSet,
        selector: Option<NodeId>,
        hero: HeroChoice,
    ) -> NodeState {
        if selector == Some(node.id) {
            return NodeState {
                rank: 1,
                choice_index: hero.index(),
            };
        }

        selections
            .get(node.id)
            .and_then(|sel| {
                node.entry_index(sel.entry_id).map(|index| NodeState {
                    rank: sel.rank,
                    choice_index: index as u64,
                })
            })
            .unwrap_or(NodeState {
                rank: 0,
                choice_index: 0,
            })
    }

    fn write_node(&self, w: &mut BitWriter, node: &Node, state: NodeState) {
        let selected = state.rank > 0 || self.profile.is_always_free(node.id);
        w.put_flag(selected);
        if !selected {
            return;
        }

        // Free nodes are granted, not purchased, and carry no payload
        w.put_flag(!node.free_node);
        if node.free_node {
            return;
        }

        if state.rank == node.max_ranks {
            w.put_flag(false);
        } else {
            w.put_flag(true);
            w.put(RANK_BITS, u64::from(state.rank));
        }

        if node.node_type.has_choice() {
            w.put_flag(true);
            w.put(CHOICE_BITS, state.choice_index);
        } else {
            w.put_flag(false);
        }

        trace!(node_id = node.id, rank = state.rank, choice = state.choice_index, "node written");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tree::{Entry, NodeType};
    use crate::selection::ResolvedSelection;

    const SPEC_ID: u32 = 581;

    fn node(id: NodeId, node_type: NodeType, max_ranks: u32, entries: &[u32]) -> Node {
        Node {
            id,
            node_type,
            max_ranks,
            free_node: false,
            entries: entries.iter().map(|&id| Entry { id }).collect(),
        }
    }

    fn tree(order: Vec<NodeId>, nodes: Vec<Node>) -> TreeDefinition {
        TreeDefinition::new(
            SPEC_ID,
            "Vengeance",
            "Demon Hunter",
            order,
            nodes,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
    }

    fn select(set: &mut SelectionSet, node_id: NodeId, entry_id: u32, rank: u32) {
        set.insert(
            node_id,
            ResolvedSelection {
                entry_id,
                rank,
                name: format!("talent_{}", node_id),
            },
        );
    }

    fn encoder() -> LoadoutEncoder {
        LoadoutEncoder::new(ClassProfile::default())
    }

    /// Header bits followed by `body`, packed the same way the encoder packs
    fn expected(body: &[(u32, u64)]) -> String {
        let mut w = BitWriter::new();
        w.put(VERSION_BITS, SERIALIZATION_VERSION);
        w.put(SPEC_BITS, u64::from(SPEC_ID));
        w.put(TREE_HASH_BITS, 0);
        for &(width, value) in body {
            w.put(width, value);
        }
        w.finish()
    }

    #[test]
    fn test_empty_selection_is_single_zero_bit() {
        let t = tree(vec![1, 2], vec![node(1, NodeType::Single, 1, &[10])]);
        let out = encoder().encode(&t, &SelectionSet::new(), HeroChoice::First);
        assert_eq!(out, "A");
    }

    #[test]
    fn test_two_node_scenario_literal() {
        let t = tree(
            vec![1, 2],
            vec![
                node(1, NodeType::Single, 1, &[10]),
                node(2, NodeType::Single, 1, &[20]),
            ],
        );
        let mut sel = SelectionSet::new();
        select(&mut sel, 1, 10, 1);

        let out = encoder().encode(&t, &sel, HeroChoice::First);
        // version 2, spec 581, 128 zero bits, then 1,1,0,0 and 0
        assert_eq!(out, format!("CUk{}MA", "A".repeat(22)));
        assert_eq!(out, expected(&[(1, 1), (1, 1), (1, 0), (1, 0), (1, 0)]));
    }

    #[test]
    fn test_missing_node_is_one_zero_bit() {
        let t = tree(vec![1, 99, 2], vec![
            node(1, NodeType::Single, 1, &[10]),
            node(2, NodeType::Single, 1, &[20]),
        ]);
        let mut sel = SelectionSet::new();
        select(&mut sel, 1, 10, 1);
        select(&mut sel, 2, 20, 1);

        let out = encoder().encode(&t, &sel, HeroChoice::First);
        assert_eq!(
            out,
            expected(&[
                (1, 1), (1, 1), (1, 0), (1, 0),
                (1, 0),
                (1, 1), (1, 1), (1, 0), (1, 0),
            ])
        );
    }

    #[test]
    fn test_partial_rank_writes_rank_field() {
        let t = tree(vec![1], vec![node(1, NodeType::Single, 3, &[10])]);
        let mut sel = SelectionSet::new();
        select(&mut sel, 1, 10, 2);

        let out = encoder().encode(&t, &sel, HeroChoice::First);
        assert_eq!(
            out,
            expected(&[(1, 1), (1, 1), (1, 1), (RANK_BITS, 2), (1, 0)])
        );
    }

    #[test]
    fn test_full_rank_has_no_rank_field() {
        let t = tree(vec![1], vec![node(1, NodeType::Single, 2, &[10])]);
        let mut full = SelectionSet::new();
        select(&mut full, 1, 10, 2);
        let mut partial = SelectionSet::new();
        select(&mut partial, 1, 10, 1);

        let full_out = encoder().encode(&t, &full, HeroChoice::First);
        assert_eq!(full_out, expected(&[(1, 1), (1, 1), (1, 0), (1, 0)]));

        // 6 extra rank bits cross a symbol boundary in the partial case
        let partial_out = encoder().encode(&t, &partial, HeroChoice::First);
        assert_eq!(partial_out.len(), full_out.len() + 1);
    }

    #[test]
    fn test_choice_node_writes_entry_index() {
        let t = tree(vec![5], vec![node(5, NodeType::Choice, 1, &[50, 51])]);
        let mut sel = SelectionSet::new();
        select(&mut sel, 5, 51, 1);

        let out = encoder().encode(&t, &sel, HeroChoice::First);
        assert_eq!(
            out,
            expected(&[(1, 1), (1, 1), (1, 0), (1, 1), (CHOICE_BITS, 1)])
        );
    }

    #[test]
    fn test_unknown_entry_counts_as_unselected() {
        let t = tree(vec![5], vec![node(5, NodeType::Choice, 1, &[50, 51])]);
        let mut sel = SelectionSet::new();
        select(&mut sel, 5, 77, 1);

        let out = encoder().encode(&t, &sel, HeroChoice::First);
        assert_eq!(out, expected(&[(1, 0)]));
    }

    #[test]
    fn test_free_node_has_no_payload() {
        let mut free = node(3, NodeType::Single, 1, &[30]);
        free.free_node = true;
        let t = tree(vec![3], vec![free]);
        let mut sel = SelectionSet::new();
        select(&mut sel, 3, 30, 1);

        let out = encoder().encode(&t, &sel, HeroChoice::First);
        assert_eq!(out, expected(&[(1, 1), (1, 0)]));
    }

    #[test]
    fn test_always_free_node_selected_without_rank() {
        let mut granted = node(94917, NodeType::Single, 1, &[1]);
        granted.free_node = true;
        let t = tree(
            vec![1, 94917],
            vec![node(1, NodeType::Single, 1, &[10]), granted],
        );
        let mut sel = SelectionSet::new();
        select(&mut sel, 1, 10, 1);

        let out = encoder().encode(&t, &sel, HeroChoice::First);
        assert_eq!(
            out,
            expected(&[(1, 1), (1, 1), (1, 0), (1, 0), (1, 1), (1, 0)])
        );
    }

    #[test]
    fn test_hero_selector_node_uses_hero_choice() {
        let t = tree(
            vec![1, 99823],
            vec![
                node(1, NodeType::Single, 1, &[10]),
                node(99823, NodeType::Subtree, 1, &[123329, 123330]),
            ],
        );
        let mut sel = SelectionSet::new();
        select(&mut sel, 1, 10, 1);

        let first = encoder().encode(&t, &sel, HeroChoice::First);
        let second = encoder().encode(&t, &sel, HeroChoice::Second);
        let base = [(1, 1), (1, 1), (1, 0), (1, 0), (1, 1), (1, 1), (1, 0), (1, 1)];

        let mut first_bits = base.to_vec();
        first_bits.push((CHOICE_BITS, 0));
        let mut second_bits = base.to_vec();
        second_bits.push((CHOICE_BITS, 1));

        assert_eq!(first, expected(&first_bits));
        assert_eq!(second, expected(&second_bits));
    }

    #[test]
    fn test_selector_overrides_explicit_selection() {
        let t = tree(
            vec![99823],
            vec![node(99823, NodeType::Subtree, 1, &[123329, 123330])],
        );
        let mut sel = SelectionSet::new();
        select(&mut sel, 99823, 123329, 1);

        let out = encoder().encode(&t, &sel, HeroChoice::Second);
        assert_eq!(
            out,
            expected(&[(1, 1), (1, 1), (1, 0), (1, 1), (CHOICE_BITS, 1)])
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let nodes: Vec<Node> = (1..=40)
            .map(|id| node(id, if id % 3 == 0 { NodeType::Choice } else { NodeType::Single }, 2, &[id * 10, id * 10 + 1]))
            .collect();
        let t = tree((1..=45).collect(), nodes);
        let mut sel = SelectionSet::new();
        for id in (1..=40).step_by(2) {
            select(&mut sel, id, id * 10 + (id % 2), 1 + id % 2);
        }

        let a = encoder().encode(&t, &sel, HeroChoice::Second);
        let b = encoder().encode(&t, &sel, HeroChoice::Second);
        assert_eq!(a, b);
    }
}
