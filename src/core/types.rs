//! Shared identifiers used across resolution and encoding

use serde::{Deserialize, Serialize};

/// Identity of one slot in a talent tree
pub type NodeId = u32;

/// Identity of one concrete option at a node
pub type EntryId = u32;

/// The external identity a talent name resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TalentId {
    pub node_id: NodeId,
    pub entry_id: EntryId,
}

impl TalentId {
    pub fn new(node_id: NodeId, entry_id: EntryId) -> Self {
        Self { node_id, entry_id }
    }
}

/// Which of the two hero trees a loadout uses
///
/// The index is what the hero-tree selector node carries as its choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeroChoice {
    First,
    Second,
}

impl HeroChoice {
    pub fn index(self) -> u64 {
        match self {
            HeroChoice::First => 0,
            HeroChoice::Second => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hero_choice_index() {
        assert_eq!(HeroChoice::First.index(), 0);
        assert_eq!(HeroChoice::Second.index(), 1);
    }

    #[test]
    fn test_hero_choice_toml_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            choice: HeroChoice,
        }
        let w: Wrapper = toml::from_str("choice = \"second\"").unwrap();
        assert_eq!(w.choice, HeroChoice::Second);
    }
}
