//! Cached, cross-process-safe access to the talent tree dataset
//!
//! The filtered dataset is kept as a JSON file shared by every process using
//! the same data directory. Writes are atomic renames guarded by a
//! non-blocking lock: a process that loses the race keeps the data it already
//! has instead of waiting. No network I/O happens while the lock is held.

use crate::core::config::{ClassProfile, HasherConfig};
use crate::core::error::{HashError, Result};
use crate::metadata::source::MetadataSource;
use crate::metadata::tree::TreeDefinition;
use crate::storage::{self, sibling_lock_path, FileLocker};
use ahash::AHashMap;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a snapshot was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Fresh cache file, no fetch
    Cache,
    /// Fetched from the source during this load
    Fetched,
    /// Fetch failed; the last cached file was used regardless of age
    StaleFallback,
}

/// One loaded generation of tree definitions, keyed by lowercase spec name
#[derive(Debug, Clone)]
pub struct MetadataSnapshot {
    trees: AHashMap<String, Arc<TreeDefinition>>,
    rejected: AHashMap<String, String>,
    origin: SnapshotOrigin,
}

impl MetadataSnapshot {
    /// Map raw dataset entries onto typed trees, rejecting bad ones individually
    pub fn from_raw(raw: &[Value], origin: SnapshotOrigin) -> Self {
        let mut trees = AHashMap::new();
        let mut rejected = AHashMap::new();

        for (i, value) in raw.iter().enumerate() {
            let spec_name = value
                .get("specName")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("<entry {}>", i));

            match TreeDefinition::from_json(value) {
                Ok(tree) => {
                    trees.insert(spec_name.to_lowercase(), Arc::new(tree));
                }
                Err(reason) => {
                    warn!(spec = %spec_name, %reason, "Rejecting talent tree");
                    rejected.insert(spec_name.to_lowercase(), reason);
                }
            }
        }

        Self {
            trees,
            rejected,
            origin,
        }
    }

    /// Tree for a spec name (case-insensitive)
    pub fn tree(&self, spec_name: &str) -> Result<Arc<TreeDefinition>> {
        let key = spec_name.to_lowercase();
        if let Some(tree) = self.trees.get(&key) {
            return Ok(Arc::clone(tree));
        }
        match self.rejected.get(&key) {
            Some(reason) => Err(HashError::MalformedTree {
                spec: spec_name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(HashError::SpecializationNotFound(spec_name.to_string())),
        }
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    pub fn spec_count(&self) -> usize {
        self.trees.len()
    }

    pub fn rejected_specs(&self) -> impl Iterator<Item = &str> {
        self.rejected.keys().map(String::as_str)
    }
}

/// Sole writer of the shared metadata cache
pub struct MetadataStore {
    source: Box<dyn MetadataSource>,
    locker: Arc<dyn FileLocker>,
    cache_path: PathBuf,
    max_age: Duration,
    class: ClassProfile,
}

impl MetadataStore {
    pub fn new(
        config: &HasherConfig,
        source: Box<dyn MetadataSource>,
        locker: Arc<dyn FileLocker>,
    ) -> Self {
        Self {
            source,
            locker,
            cache_path: config.metadata_cache_path(),
            max_age: config.metadata_max_age(),
            class: config.class.clone(),
        }
    }

    pub fn cache_path(&self) -> &PathBuf {
        &self.cache_path
    }

    /// Load one tree per known specialization
    ///
    /// A fresh cache is reused unless `force_refresh` is set. A failed fetch,
    /// or one with no usable tree for this class, falls back to whatever
    /// snapshot exists on disk, however old.
    pub fn load(&self, force_refresh: bool) -> Result<MetadataSnapshot> {
        if !force_refresh {
            match storage::read_json_if_fresh::<Vec<Value>>(&self.cache_path, self.max_age) {
                Ok(Some(raw)) => {
                    debug!(path = %self.cache_path.display(), "Using cached talent trees");
                    return Ok(MetadataSnapshot::from_raw(&raw, SnapshotOrigin::Cache));
                }
                Ok(None) => debug!("No fresh talent tree cache"),
                Err(e) => warn!(error = %e, "Unreadable talent tree cache, refetching"),
            }
        }

        info!(force_refresh, "Fetching talent trees");
        let fetch_err = match self.fetch_usable() {
            Ok((filtered, snapshot)) => {
                self.persist(&filtered);
                return Ok(snapshot);
            }
            Err(e) => e,
        };

        warn!(error = %fetch_err, "Talent tree fetch failed, trying cached snapshot");
        match storage::read_json::<Vec<Value>>(&self.cache_path) {
            Ok(Some(raw)) => Ok(MetadataSnapshot::from_raw(
                &raw,
                SnapshotOrigin::StaleFallback,
            )),
            Ok(None) => Err(HashError::MetadataUnavailable(format!(
                "{} and no cached snapshot exists",
                fetch_err
            ))),
            Err(read_err) => Err(HashError::MetadataUnavailable(format!(
                "{}; cached snapshot unreadable: {}",
                fetch_err, read_err
            ))),
        }
    }

    /// Fetch and filter; a dataset with no loadable tree for this class is an error
    fn fetch_usable(&self) -> Result<(Vec<Value>, MetadataSnapshot)> {
        let filtered = self.filter(self.source.fetch()?);
        let snapshot = MetadataSnapshot::from_raw(&filtered, SnapshotOrigin::Fetched);
        if snapshot.spec_count() == 0 {
            return Err(HashError::MetadataUnavailable(format!(
                "fetched dataset has no usable {} tree ({} kept after filtering)",
                self.class.class_name,
                filtered.len()
            )));
        }
        Ok((filtered, snapshot))
    }

    /// Keep only this class's configured specializations
    fn filter(&self, raw: Vec<Value>) -> Vec<Value> {
        let total = raw.len();
        let kept: Vec<Value> = raw
            .into_iter()
            .filter(|tree| {
                let class_name = tree.get("className").and_then(Value::as_str);
                let class_id = tree.get("classId").and_then(Value::as_u64);
                let spec_name = tree.get("specName").and_then(Value::as_str);

                class_name == Some(self.class.class_name.as_str())
                    && class_id == Some(u64::from(self.class.class_id))
                    && spec_name.is_some_and(|s| self.class.spec_names.iter().any(|n| n == s))
            })
            .collect();
        debug!(total, kept = kept.len(), "Filtered talent dataset");
        kept
    }

    /// Write the snapshot if no other process is writing it
    fn persist(&self, filtered: &[Value]) {
        let lock_path = sibling_lock_path(&self.cache_path);
        let guard = match self.locker.try_acquire_exclusive(&lock_path) {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                info!("Talent tree cache is being updated by another process, not writing");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Could not lock talent tree cache, not writing");
                return;
            }
        };

        match storage::write_json_atomic(&self.cache_path, filtered) {
            Ok(()) => info!(path = %self.cache_path.display(), "Cached talent trees"),
            Err(e) => warn!(error = %e, "Failed to write talent tree cache"),
        }
        drop(guard);
    }
}
