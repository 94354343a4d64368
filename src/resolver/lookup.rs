//! External talent name → node/entry lookup
//!
//! simc answers `spell_query=talent.name=<name>` with a text report that
//! includes `Entry : <id>` and `Node : <id>` lines.

use crate::core::error::{HashError, Result};
use crate::core::types::TalentId;
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Resolves one talent name to its tree identity
pub trait TalentLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Result<TalentId>;
}

/// Patterns for the two ids in a spell_query report
#[derive(Debug, Clone)]
pub struct SpellQueryParser {
    entry: Regex,
    node: Regex,
}

impl SpellQueryParser {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| HashError::Config(format!("bad pattern {}: {}", pattern, e)))
        };
        Ok(Self {
            entry: compile(r"Entry\s+:\s+(\d+)")?,
            node: compile(r"Node\s+:\s+(\d+)")?,
        })
    }

    /// Extract both ids; missing either one fails the name
    pub fn parse(&self, name: &str, output: &str) -> Result<TalentId> {
        let entry_id = Self::capture(&self.entry, output)
            .ok_or_else(|| HashError::resolution(name, "no entry id in spell_query output"))?;
        let node_id = Self::capture(&self.node, output)
            .ok_or_else(|| HashError::resolution(name, "no node id in spell_query output"))?;
        Ok(TalentId::new(node_id, entry_id))
    }

    fn capture(pattern: &Regex, output: &str) -> Option<u32> {
        pattern
            .captures(output)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

/// Runs the simc binary once per name
pub struct SimcLookup {
    simc_path: PathBuf,
    parser: SpellQueryParser,
}

impl SimcLookup {
    pub fn new(simc_path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            simc_path: simc_path.into(),
            parser: SpellQueryParser::new()?,
        })
    }
}

impl TalentLookup for SimcLookup {
    fn lookup(&self, name: &str) -> Result<TalentId> {
        debug!(talent = name, "Querying simc");
        let output = Command::new(&self.simc_path)
            .arg(format!("spell_query=talent.name={}", name))
            .output()
            .map_err(|e| {
                HashError::resolution(
                    name,
                    format!("failed to run {}: {}", self.simc_path.display(), e),
                )
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match self.parser.parse(name, &stdout) {
            Ok(id) => Ok(id),
            Err(_) if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(HashError::resolution(
                    name,
                    format!("simc exited with {}: {}", output.status, stderr.trim()),
                ))
            }
            Err(e) => Err(e),
        }
    }
}
