//! Memoized loadout hashes keyed by the exact input strings
//!
//! Keys are not normalized: `"A:1"` and `"a:1"` are different entries. The
//! table is loaded once and written back after a batch, not per entry.

use crate::core::error::{HashError, Result};
use crate::hasher::TalentHasher;
use crate::storage::{self, sibling_lock_path, FileLocker};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// The four inputs a hash is computed from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadoutKey {
    pub hero: String,
    pub class: String,
    pub spec: String,
    pub spec_name: String,
}

impl LoadoutKey {
    pub fn new(
        hero: impl Into<String>,
        class: impl Into<String>,
        spec: impl Into<String>,
        spec_name: impl Into<String>,
    ) -> Self {
        Self {
            hero: hero.into(),
            class: class.into(),
            spec: spec.into(),
            spec_name: spec_name.into(),
        }
    }
}

/// On-disk row
#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    #[serde(flatten)]
    key: LoadoutKey,
    hash: String,
}

pub struct HashCache {
    hasher: Arc<TalentHasher>,
    locker: Arc<dyn FileLocker>,
    path: PathBuf,
    entries: RwLock<AHashMap<LoadoutKey, String>>,
}

impl HashCache {
    /// Load the durable table that belongs to `hasher`'s data directory
    pub fn load(hasher: Arc<TalentHasher>, locker: Arc<dyn FileLocker>) -> Self {
        let path = hasher.config().hash_cache_path();
        let entries = Self::read_durable(&path);
        debug!(path = %path.display(), entries = entries.len(), "Loaded talent hash cache");

        Self {
            hasher,
            locker,
            path,
            entries: RwLock::new(entries),
        }
    }

    fn read_durable(path: &Path) -> AHashMap<LoadoutKey, String> {
        match storage::read_json::<Vec<CacheRecord>>(path) {
            Ok(Some(records)) => records.into_iter().map(|r| (r.key, r.hash)).collect(),
            Ok(None) => AHashMap::new(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable talent hash cache");
                AHashMap::new()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &LoadoutKey) -> Option<String> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached hash for the inputs, computing it on a miss
    pub fn get_or_compute(&self, hero: &str, class: &str, spec: &str, spec_name: &str) -> Result<String> {
        self.get_or_compute_key(&LoadoutKey::new(hero, class, spec, spec_name))
    }

    fn get_or_compute_key(&self, key: &LoadoutKey) -> Result<String> {
        if let Some(hash) = self.get(key) {
            return Ok(hash);
        }

        let hash = self
            .hasher
            .generate(&key.hero, &key.class, &key.spec, &key.spec_name)?;
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.clone(), hash.clone());
        }
        Ok(hash)
    }

    /// Hash many loadouts in parallel, then save the table once
    ///
    /// Results are in input order. Each distinct key is computed once. If
    /// any loadout fails, successes are still cached and the first failure
    /// in input order is returned.
    pub fn get_or_compute_batch(&self, keys: &[LoadoutKey]) -> Result<Vec<String>> {
        let results = self
            .hasher
            .pool()
            .map_unique(keys.iter().cloned(), |key| self.get_or_compute_key(key));

        if let Err(e) = self.save() {
            warn!(error = %e, "Talent hash cache not saved");
        }

        let mut hashes = AHashMap::with_capacity(results.len());
        let mut failures = AHashMap::new();
        for (key, result) in results {
            match result {
                Ok(hash) => {
                    hashes.insert(key, hash);
                }
                Err(e) => {
                    failures.insert(key, e);
                }
            }
        }

        for key in keys {
            if let Some(e) = failures.remove(key) {
                return Err(e);
            }
        }

        keys.iter()
            .map(|key| {
                hashes
                    .get(key)
                    .cloned()
                    .ok_or_else(|| HashError::Config(format!("no result for {:?}", key)))
            })
            .collect()
    }

    /// Merge the in-memory table over the durable one and write it
    pub fn save(&self) -> Result<usize> {
        let lock_path = sibling_lock_path(&self.path);
        let _guard = self.locker.acquire_exclusive(&lock_path)?;

        let mut merged = Self::read_durable(&self.path);
        {
            let entries = self
                .entries
                .read()
                .map_err(|_| HashError::Lock("talent hash cache poisoned".into()))?;
            merged.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut records: Vec<CacheRecord> = merged
            .into_iter()
            .map(|(key, hash)| CacheRecord { key, hash })
            .collect();
        records.sort_by(|a, b| {
            (&a.key.spec_name, &a.key.hero, &a.key.class, &a.key.spec)
                .cmp(&(&b.key.spec_name, &b.key.hero, &b.key.class, &b.key.spec))
        });

        storage::write_json_atomic(&self.path, &records)?;
        info!(entries = records.len(), "Saved talent hash cache");
        Ok(records.len())
    }

    /// Drop every hash and make the next encode refetch talent metadata
    pub fn clear(&self) -> Result<()> {
        let lock_path = sibling_lock_path(&self.path);
        let _guard = self.locker.acquire_exclusive(&lock_path)?;

        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        storage::remove_if_exists(&self.path)?;
        self.hasher.request_metadata_refresh();
        info!("Cleared talent hash cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::HasherConfig;
    use crate::core::types::TalentId;
    use crate::metadata::MetadataSource;
    use crate::resolver::TalentLookup;
    use crate::storage::MemoryLocker;
    use serde_json::{json, Value};

    struct OneTree;

    impl MetadataSource for OneTree {
        fn fetch(&self) -> Result<Vec<Value>> {
            Ok(vec![json!({
                "specId": 577,
                "specName": "Havoc",
                "className": "Demon Hunter",
                "classId": 12,
                "fullNodeOrder": [1, 2],
                "classNodes": [{"id": 1, "type": "single", "maxRanks": 2, "entries": [{"id": 10}]}],
                "specNodes": [],
                "heroNodes": [{"id": 2, "type": "single", "maxRanks": 1, "entries": [{"id": 20}]}],
                "subTreeNodes": []
            })])
        }
    }

    struct Lookup;

    impl TalentLookup for Lookup {
        fn lookup(&self, name: &str) -> Result<TalentId> {
            match name {
                "chaos_strike" => Ok(TalentId::new(1, 10)),
                "demonsurge" => Ok(TalentId::new(2, 20)),
                _ => Err(HashError::resolution(name, "unknown talent")),
            }
        }
    }

    fn cache(dir: &Path) -> HashCache {
        let locker: Arc<dyn FileLocker> = Arc::new(MemoryLocker::new());
        let hasher = TalentHasher::new(
            HasherConfig::with_data_dir(dir),
            Box::new(OneTree),
            Box::new(Lookup),
            Arc::clone(&locker),
        )
        .unwrap();
        HashCache::load(Arc::new(hasher), locker)
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        cache
            .get_or_compute("demonsurge:1", "chaos_strike:1", "", "Havoc")
            .unwrap();
        cache
            .get_or_compute("demonsurge:1", "chaos_strike:1", "", "havoc")
            .unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_batch_preserves_order_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let full = LoadoutKey::new("demonsurge:1", "chaos_strike:2", "", "Havoc");
        let partial = LoadoutKey::new("demonsurge:1", "chaos_strike:1", "", "Havoc");

        let hashes = cache
            .get_or_compute_batch(&[full.clone(), partial.clone(), full.clone()])
            .unwrap();

        assert_eq!(hashes.len(), 3);
        assert_eq!(hashes[0], hashes[2]);
        assert_ne!(hashes[0], hashes[1]);
        assert!(cache.path().exists());

        let reloaded = super::HashCache::read_durable(cache.path());
        assert_eq!(reloaded.get(&partial), Some(&hashes[1]));
    }

    #[test]
    fn test_batch_reports_first_failure_but_keeps_successes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let good = LoadoutKey::new("demonsurge:1", "chaos_strike:1", "", "Havoc");
        let bad = LoadoutKey::new("demonsurge:1", "not_a_talent:1", "", "Havoc");

        match cache.get_or_compute_batch(&[good.clone(), bad]) {
            Err(HashError::ResolutionFailed { name, .. }) => assert_eq!(name, "not_a_talent"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(cache.get(&good).is_some());
    }

    #[test]
    fn test_clear_empties_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let key = LoadoutKey::new("demonsurge:1", "chaos_strike:1", "", "Havoc");
        cache.get_or_compute_batch(std::slice::from_ref(&key)).unwrap();

        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(!cache.path().exists());
    }
}
