//! Parsing of `name:rank/name:rank` talent strings

use crate::core::error::{HashError, Result};
use ahash::AHashSet;

/// One `name:rank` segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalentToken {
    pub name: String,
    pub rank: u32,
}

impl TalentToken {
    pub fn new(name: impl Into<String>, rank: u32) -> Self {
        Self {
            name: name.into(),
            rank,
        }
    }
}

/// Split a talent string into tokens; empty segments are skipped
pub fn parse_talent_string(input: &str) -> Result<Vec<TalentToken>> {
    input
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(parse_token)
        .collect()
}

fn parse_token(segment: &str) -> Result<TalentToken> {
    let invalid = || HashError::InvalidTalentToken(segment.to_string());

    let (name, rank) = segment.split_once(':').ok_or_else(invalid)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid());
    }
    let rank = rank.trim().parse::<u32>().map_err(|_| invalid())?;

    Ok(TalentToken::new(name, rank))
}

/// The three talent categories of one loadout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLoadout {
    pub class: Vec<TalentToken>,
    pub spec: Vec<TalentToken>,
    pub hero: Vec<TalentToken>,
}

impl ParsedLoadout {
    pub fn parse(hero: &str, class: &str, spec: &str) -> Result<Self> {
        Ok(Self {
            class: parse_talent_string(class)?,
            spec: parse_talent_string(spec)?,
            hero: parse_talent_string(hero)?,
        })
    }

    /// All tokens in merge order: class, then spec, then hero
    pub fn tokens(&self) -> impl Iterator<Item = &TalentToken> {
        self.class.iter().chain(&self.spec).chain(&self.hero)
    }

    /// Distinct talent names across all three strings
    pub fn unique_names(&self) -> AHashSet<String> {
        self.tokens().map(|t| t.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.class.is_empty() && self.spec.is_empty() && self.hero.is_empty()
    }
}
