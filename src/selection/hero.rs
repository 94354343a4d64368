//! Inferring the active hero tree from marker talents

use crate::core::config::{ClassProfile, HeroMarker};
use crate::core::error::{HashError, Result};
use crate::core::types::HeroChoice;
use crate::selection::parse::TalentToken;

/// Pick the hero tree whose marker talent is taken in the hero string
///
/// Exactly one marker must be present with a rank above zero. No marker, or
/// markers from both trees, is reported rather than guessed.
pub fn detect_hero_choice(
    hero_tokens: &[TalentToken],
    profile: &ClassProfile,
    spec_name: &str,
) -> Result<HeroChoice> {
    let found: Vec<&HeroMarker> = profile
        .hero_markers
        .iter()
        .filter(|marker| {
            hero_tokens
                .iter()
                .any(|t| t.rank > 0 && t.name.eq_ignore_ascii_case(&marker.talent))
        })
        .collect();

    match found.as_slice() {
        [marker] => Ok(marker.choice),
        [] => Err(HashError::AmbiguousHeroSpec {
            spec: spec_name.to_string(),
            reason: format!(
                "hero talents contain none of the marker talents ({})",
                marker_list(profile.hero_markers.iter())
            ),
        }),
        several => Err(HashError::AmbiguousHeroSpec {
            spec: spec_name.to_string(),
            reason: format!(
                "hero talents contain markers of several hero trees ({})",
                marker_list(several.iter().copied())
            ),
        }),
    }
}

fn marker_list<'a>(markers: impl Iterator<Item = &'a HeroMarker>) -> String {
    markers
        .map(|m| format!("{} → {}", m.talent, m.hero_tree))
        .collect::<Vec<_>>()
        .join(", ")
}
