//! Bounded worker pool with keyed result aggregation
//!
//! Lookups and batch hashing both fan out over a set of independent keys.
//! Each worker computes a pure result for one key; results are collected
//! into a map once all workers finish. Duplicate keys are collapsed before
//! dispatch so each distinct key is computed exactly once.

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::hash::Hash;

use crate::core::error::{HashError, Result};

pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Create a pool with `threads` workers (0 = one per CPU)
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("talent-worker-{}", i))
            .build()
            .map_err(|e| HashError::Config(format!("failed to start worker pool: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` once per distinct key and gather results by key
    pub fn map_unique<K, V, F>(&self, keys: impl IntoIterator<Item = K>, job: F) -> AHashMap<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync,
        V: Send,
        F: Fn(&K) -> V + Sync + Send,
    {
        let unique: Vec<K> = keys
            .into_iter()
            .collect::<AHashSet<K>>()
            .into_iter()
            .collect();

        if unique.is_empty() {
            return AHashMap::new();
        }

        let results: Vec<(K, V)> = self.pool.install(|| {
            unique
                .par_iter()
                .map(|key| (key.clone(), job(key)))
                .collect()
        });
        results.into_iter().collect()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}
