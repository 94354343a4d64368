//! Hasher configuration with documented defaults
//!
//! Every path, freshness window and class-specific node id lives here so the
//! pipeline itself carries no magic numbers. A TOML file may override any
//! subset of fields; omitted fields keep their defaults.

use crate::core::error::{HashError, Result};
use crate::core::types::{HeroChoice, NodeId};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for metadata loading, name resolution and caching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HasherConfig {
    // === STORAGE ===
    /// Directory holding the three durable caches and their lock files
    ///
    /// Shared by every process on the machine that hashes talents, which is
    /// why all writers go through file locks.
    pub data_dir: PathBuf,

    // === METADATA ===
    /// URL of the talent tree dataset (a JSON array, one tree per spec)
    pub talents_url: String,

    /// Age after which the cached tree snapshot is refetched (seconds)
    ///
    /// Tree layouts change with game patches, so a day is plenty.
    pub metadata_max_age_secs: u64,

    /// Request timeout for the dataset download (seconds)
    ///
    /// Keeps a slow CDN from stalling every caller.
    pub http_timeout_secs: u64,

    // === NAME RESOLUTION ===
    /// Path to the simc executable used for `spell_query` lookups
    pub simc_path: PathBuf,

    /// Age after which the name cache is discarded on load (seconds)
    ///
    /// Node and entry ids can shift between simc builds. At 3600 a cache
    /// survives a batch run but not a rebuild of simc the next day.
    pub name_cache_max_age_secs: u64,

    /// Attempts at taking the name cache lock before persist gives up
    pub lock_retries: u32,

    // === PARALLELIZATION ===
    /// Worker threads for lookups and batch hashing (0 = one per CPU)
    pub worker_threads: usize,

    // === CLASS ===
    /// Which class and specs this hasher serves, plus hero-tree wiring
    pub class: ClassProfile,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            talents_url: "https://www.raidbots.com/static/data/beta/talents.json".into(),
            metadata_max_age_secs: 24 * 60 * 60,
            http_timeout_secs: 30,
            simc_path: PathBuf::from("../simc/engine/simc"),
            name_cache_max_age_secs: 60 * 60,
            lock_retries: 3,
            worker_threads: 0,
            class: ClassProfile::default(),
        }
    }
}

/// Class-specific data that the wire format depends on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassProfile {
    /// `className` the dataset is filtered by
    pub class_name: String,

    /// `classId` the dataset is filtered by
    pub class_id: u32,

    /// Specializations kept after filtering
    pub spec_names: Vec<String>,

    /// Hero-tree selector node per spec
    ///
    /// Keys are spec names matched case-insensitively; two keys that differ
    /// only in case are rejected by `validate`.
    ///
    /// This node never appears in a talent string. It is always emitted as
    /// selected with the active hero tree as its choice index.
    pub hero_selector_nodes: AHashMap<String, NodeId>,

    /// Nodes always emitted as selected even with no purchased rank
    pub always_free_nodes: Vec<NodeId>,

    /// Talents whose presence in the hero string identifies the hero tree
    pub hero_markers: Vec<HeroMarker>,
}

impl Default for ClassProfile {
    fn default() -> Self {
        let mut hero_selector_nodes = AHashMap::new();
        hero_selector_nodes.insert("vengeance".to_string(), 99823);
        hero_selector_nodes.insert("havoc".to_string(), 99824);

        Self {
            class_name: "Demon Hunter".into(),
            class_id: 12,
            spec_names: vec!["Vengeance".into(), "Havoc".into()],
            hero_selector_nodes,
            always_free_nodes: vec![94917, 94915],
            hero_markers: vec![
                HeroMarker {
                    talent: "art_of_the_glaive".into(),
                    hero_tree: "Aldrachi Reaver".into(),
                    choice: HeroChoice::First,
                },
                HeroMarker {
                    talent: "demonsurge".into(),
                    hero_tree: "Felscarred".into(),
                    choice: HeroChoice::Second,
                },
            ],
        }
    }
}

impl ClassProfile {
    /// Selector node for a spec, matched case-insensitively
    pub fn hero_selector_node(&self, spec_name: &str) -> Option<NodeId> {
        self.hero_selector_nodes
            .iter()
            .find(|(spec, _)| spec.eq_ignore_ascii_case(spec_name))
            .map(|(_, &node)| node)
    }

    pub fn is_always_free(&self, node_id: NodeId) -> bool {
        self.always_free_nodes.contains(&node_id)
    }

    /// Whether a spec name belongs to this profile (case-insensitive)
    pub fn knows_spec(&self, spec_name: &str) -> bool {
        self.spec_names
            .iter()
            .any(|s| s.eq_ignore_ascii_case(spec_name))
    }
}

/// A talent that is only reachable in one hero tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroMarker {
    pub talent: String,
    pub hero_tree: String,
    pub choice: HeroChoice,
}

impl HasherConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config rooted at a different data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document, filling omitted fields with defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HasherConfig =
            toml::from_str(content).map_err(|e| HashError::Config(e.to_string()))?;
        config.validate().map_err(HashError::Config)?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.class.spec_names.is_empty() {
            return Err("class.spec_names must name at least one spec".into());
        }

        let mut selector_specs = AHashSet::new();
        for spec in self.class.hero_selector_nodes.keys() {
            if !self.class.knows_spec(spec) {
                return Err(format!(
                    "hero selector configured for unknown spec '{}'",
                    spec
                ));
            }
            if !selector_specs.insert(spec.to_ascii_lowercase()) {
                return Err(format!(
                    "hero selector for spec '{}' configured more than once",
                    spec
                ));
            }
        }

        let mut choices: Vec<HeroChoice> = self.class.hero_markers.iter().map(|m| m.choice).collect();
        choices.sort_by_key(|c| c.index());
        choices.dedup();
        if choices.len() != self.class.hero_markers.len() {
            return Err("each hero choice may have only one marker talent".into());
        }

        if self.lock_retries == 0 {
            return Err("lock_retries must be at least 1".into());
        }

        Ok(())
    }

    pub fn metadata_max_age(&self) -> Duration {
        Duration::from_secs(self.metadata_max_age_secs)
    }

    pub fn name_cache_max_age(&self) -> Duration {
        Duration::from_secs(self.name_cache_max_age_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn metadata_cache_path(&self) -> PathBuf {
        self.data_dir.join("talents_cache.json")
    }

    pub fn name_cache_path(&self) -> PathBuf {
        self.data_dir.join("talent_cache.json")
    }

    pub fn hash_cache_path(&self) -> PathBuf {
        self.data_dir.join("talent_hash_cache.json")
    }
}
