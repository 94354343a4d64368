//! Persistent talent name → identity cache
//!
//! Read once when the resolver starts. Updates stay in memory until
//! `persist`, which takes the cross-process lock, merges with whatever other
//! processes have written since, and atomically replaces the file.

use crate::core::config::HasherConfig;
use crate::core::error::{HashError, Result};
use crate::core::types::TalentId;
use crate::storage::{self, sibling_lock_path, FileLocker, LockGuard};
use ahash::AHashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause between lock attempts; grows linearly with the attempt number
const LOCK_RETRY_BACKOFF: Duration = Duration::from_millis(50);

pub struct NameCache {
    path: PathBuf,
    max_age: Duration,
    lock_retries: u32,
    locker: Arc<dyn FileLocker>,
    entries: RwLock<AHashMap<String, TalentId>>,
    /// Set when an entry was added since the last persist
    dirty: AtomicBool,
}

impl NameCache {
    /// Load the durable cache, discarding it if older than the configured age
    pub fn load(config: &HasherConfig, locker: Arc<dyn FileLocker>) -> Self {
        let path = config.name_cache_path();
        let max_age = config.name_cache_max_age();
        let entries = Self::read_durable(&path, max_age);
        debug!(path = %path.display(), entries = entries.len(), "Loaded talent name cache");

        Self {
            path,
            max_age,
            lock_retries: config.lock_retries,
            locker,
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    fn read_durable(path: &Path, max_age: Duration) -> AHashMap<String, TalentId> {
        match storage::read_json_if_fresh::<BTreeMap<String, TalentId>>(path, max_age) {
            Ok(Some(map)) => map.into_iter().collect(),
            Ok(None) => AHashMap::new(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable talent name cache");
                AHashMap::new()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<TalentId> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(name).copied())
    }

    /// Record a successful resolution
    pub fn insert(&self, name: impl Into<String>, id: TalentId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(name.into(), id);
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    /// Whether there are resolutions not yet written to disk
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<LockGuard> {
        let lock_path = sibling_lock_path(&self.path);
        let mut last_err = None;

        for attempt in 1..=self.lock_retries {
            match self.locker.acquire_exclusive(&lock_path) {
                Ok(guard) => return Ok(guard),
                Err(e) => {
                    warn!(attempt, error = %e, "Talent name cache lock failed");
                    last_err = Some(e);
                    std::thread::sleep(LOCK_RETRY_BACKOFF * attempt);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| HashError::Lock("no lock attempts made".into())))
    }

    /// Merge in-memory entries over the durable file and write it back
    ///
    /// Entries written by other processes since load are kept and also
    /// absorbed into memory. Returns the number of entries written.
    pub fn persist(&self) -> Result<usize> {
        let _guard = self.lock()?;

        let mut merged: BTreeMap<String, TalentId> = Self::read_durable(&self.path, self.max_age)
            .into_iter()
            .collect();

        {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| HashError::Lock("talent name cache poisoned".into()))?;
            merged.extend(entries.iter().map(|(k, v)| (k.clone(), *v)));
            entries.extend(merged.iter().map(|(k, v)| (k.clone(), *v)));
            self.dirty.store(false, Ordering::SeqCst);
        }

        if let Err(e) = storage::write_json_atomic(&self.path, &merged) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }
        info!(entries = merged.len(), "Saved talent name cache");
        Ok(merged.len())
    }

    /// Drop every entry, in memory and on disk
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock()?;
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        self.dirty.store(false, Ordering::SeqCst);
        storage::remove_if_exists(&self.path)?;
        info!("Cleared talent name cache");
        Ok(())
    }
}
