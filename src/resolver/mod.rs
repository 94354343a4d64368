//! Talent name resolution with a shared, persistent cache

pub mod cache;
pub mod lookup;

pub use cache::NameCache;
pub use lookup::{SimcLookup, SpellQueryParser, TalentLookup};

use crate::core::error::Result;
use crate::core::types::TalentId;
use crate::pool::WorkerPool;
use ahash::AHashMap;
use std::sync::Arc;
use tracing::debug;

/// Maps talent names to (node, entry) ids
///
/// Cached names never reach the lookup. Uncached names in a batch are looked
/// up concurrently, once each, and only successes enter the cache.
pub struct NameResolver {
    lookup: Box<dyn TalentLookup>,
    cache: NameCache,
    pool: Arc<WorkerPool>,
}

impl NameResolver {
    pub fn new(lookup: Box<dyn TalentLookup>, cache: NameCache, pool: Arc<WorkerPool>) -> Self {
        Self {
            lookup,
            cache,
            pool,
        }
    }

    pub fn cache(&self) -> &NameCache {
        &self.cache
    }

    /// Resolve a single name
    pub fn resolve(&self, name: &str) -> Result<TalentId> {
        if let Some(id) = self.cache.get(name) {
            return Ok(id);
        }
        let id = self.lookup.lookup(name)?;
        self.cache.insert(name, id);
        Ok(id)
    }

    /// Resolve every distinct name; one failure does not affect the others
    pub fn resolve_batch<I, S>(&self, names: I) -> AHashMap<String, Result<TalentId>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut results: AHashMap<String, Result<TalentId>> = AHashMap::new();
        let mut pending = Vec::new();

        for name in names {
            let name = name.into();
            if results.contains_key(&name) {
                continue;
            }
            match self.cache.get(&name) {
                Some(id) => {
                    results.insert(name, Ok(id));
                }
                None => pending.push(name),
            }
        }

        debug!(
            cached = results.len(),
            pending = pending.len(),
            "Resolving talent names"
        );

        let looked_up = self.pool.map_unique(pending, |name| self.lookup.lookup(name));
        for (name, result) in looked_up {
            if let Ok(id) = &result {
                self.cache.insert(name.clone(), *id);
            }
            results.insert(name, result);
        }

        results
    }

    /// Write newly resolved names back to the shared cache file
    pub fn persist(&self) -> Result<usize> {
        self.cache.persist()
    }

    /// Forget every cached identity
    pub fn clear(&self) -> Result<()> {
        self.cache.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::HasherConfig;
    use crate::core::error::HashError;
    use crate::storage::{FileLocker, MemoryLocker};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingLookup {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl TalentLookup for Arc<CountingLookup> {
        fn lookup(&self, name: &str) -> Result<TalentId> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(name.to_string());
            match name {
                "broken" => Err(HashError::resolution(name, "no entry id in spell_query output")),
                _ => Ok(TalentId::new(name.len() as u32, name.len() as u32 * 10)),
            }
        }
    }

    fn resolver(dir: &std::path::Path) -> (NameResolver, Arc<CountingLookup>) {
        let lookup = Arc::new(CountingLookup::default());
        let locker: Arc<dyn FileLocker> = Arc::new(MemoryLocker::new());
        let cache = NameCache::load(&HasherConfig::with_data_dir(dir), locker);
        let pool = Arc::new(WorkerPool::new(4).unwrap());
        (
            NameResolver::new(Box::new(Arc::clone(&lookup)), cache, pool),
            lookup,
        )
    }

    #[test]
    fn test_batch_dedupes_names() {
        let dir = tempfile::tempdir().unwrap();
        let (resolver, lookup) = resolver(dir.path());

        let results = resolver.resolve_batch(vec!["aa", "bbb", "aa", "bbb", "aa"]);

        assert_eq!(results.len(), 2);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*results["aa"].as_ref().unwrap(), TalentId::new(2, 20));
    }

    #[test]
    fn test_cached_names_skip_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let (resolver, lookup) = resolver(dir.path());

        resolver.resolve("aa").unwrap();
        resolver.resolve_batch(vec!["aa", "cccc"]);

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        let seen = lookup.seen.lock().unwrap();
        assert_eq!(seen.iter().filter(|n| *n == "aa").count(), 1);
    }

    #[test]
    fn test_failure_is_isolated_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (resolver, lookup) = resolver(dir.path());

        let results = resolver.resolve_batch(vec!["broken", "fine"]);
        assert!(matches!(
            results["broken"],
            Err(HashError::ResolutionFailed { ref name, .. }) if name == "broken"
        ));
        assert!(results["fine"].is_ok());
        assert!(resolver.cache().get("broken").is_none());

        // A failed name is retried on the next call
        resolver.resolve_batch(vec!["broken"]);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_persisted_names_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (resolver, _) = resolver(dir.path());
            resolver.resolve_batch(vec!["aa", "bbb"]);
            assert_eq!(resolver.persist().unwrap(), 2);
        }

        let (restarted, lookup) = resolver(dir.path());
        let results = restarted.resolve_batch(vec!["aa", "bbb"]);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*results["bbb"].as_ref().unwrap(), TalentId::new(3, 30));
    }
}
