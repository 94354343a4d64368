//! End-to-end talent hashing: parse → resolve → select → encode
//!
//! `TalentHasher` owns one of each collaborator and is safe to share across
//! threads. Metadata is loaded lazily and kept until a refresh is requested.

use crate::core::config::HasherConfig;
use crate::core::error::{HashError, Result};
use crate::core::types::TalentId;
use crate::encoding::LoadoutEncoder;
use crate::metadata::{HttpMetadataSource, MetadataSnapshot, MetadataSource, MetadataStore};
use crate::pool::WorkerPool;
use crate::resolver::{NameCache, NameResolver, SimcLookup, TalentLookup};
use crate::selection::{detect_hero_choice, ParsedLoadout, SelectionSet};
use crate::storage::{FileLocker, FsLocker};
use ahash::AHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

pub struct TalentHasher {
    config: HasherConfig,
    metadata: MetadataStore,
    resolver: NameResolver,
    encoder: LoadoutEncoder,
    pool: Arc<WorkerPool>,
    snapshot: RwLock<Option<Arc<MetadataSnapshot>>>,
    /// Held while loading so concurrent first calls share one fetch
    load_gate: Mutex<()>,
    /// Next metadata access must bypass the cached snapshot
    refresh_pending: AtomicBool,
}

impl TalentHasher {
    /// Wire the pipeline from explicit collaborators
    pub fn new(
        config: HasherConfig,
        source: Box<dyn MetadataSource>,
        lookup: Box<dyn TalentLookup>,
        locker: Arc<dyn FileLocker>,
    ) -> Result<Self> {
        config.validate().map_err(HashError::Config)?;

        let pool = Arc::new(WorkerPool::new(config.worker_threads)?);
        let metadata = MetadataStore::new(&config, source, Arc::clone(&locker));
        let cache = NameCache::load(&config, locker);
        let resolver = NameResolver::new(lookup, cache, Arc::clone(&pool));
        let encoder = LoadoutEncoder::new(config.class.clone());

        Ok(Self {
            config,
            metadata,
            resolver,
            encoder,
            pool,
            snapshot: RwLock::new(None),
            load_gate: Mutex::new(()),
            refresh_pending: AtomicBool::new(false),
        })
    }

    /// Production wiring: HTTP dataset, simc lookups, OS file locks
    pub fn from_config(config: HasherConfig) -> Result<Self> {
        let source = HttpMetadataSource::new(config.talents_url.clone(), config.http_timeout())?;
        let lookup = SimcLookup::new(config.simc_path.clone())?;
        Self::new(config, Box::new(source), Box::new(lookup), Arc::new(FsLocker))
    }

    pub fn config(&self) -> &HasherConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    /// Current snapshot, loading (or force-refreshing) it when needed
    pub fn metadata_snapshot(&self) -> Result<Arc<MetadataSnapshot>> {
        if !self.refresh_pending.load(Ordering::SeqCst) {
            if let Some(snapshot) = self.current_snapshot() {
                return Ok(snapshot);
            }
        }

        let _gate = self
            .load_gate
            .lock()
            .map_err(|_| HashError::Lock("metadata load gate poisoned".into()))?;

        let force = self.refresh_pending.swap(false, Ordering::SeqCst);
        if !force {
            if let Some(snapshot) = self.current_snapshot() {
                return Ok(snapshot);
            }
        }

        match self.metadata.load(force) {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                if let Ok(mut slot) = self.snapshot.write() {
                    *slot = Some(Arc::clone(&snapshot));
                }
                Ok(snapshot)
            }
            Err(e) => {
                if force {
                    self.refresh_pending.store(true, Ordering::SeqCst);
                }
                Err(e)
            }
        }
    }

    fn current_snapshot(&self) -> Option<Arc<MetadataSnapshot>> {
        self.snapshot.read().ok().and_then(|s| s.clone())
    }

    /// Make the next metadata access fetch a new dataset
    pub fn request_metadata_refresh(&self) {
        self.refresh_pending.store(true, Ordering::SeqCst);
    }

    /// Fetch a new dataset now
    pub fn refresh_metadata(&self) -> Result<Arc<MetadataSnapshot>> {
        self.request_metadata_refresh();
        self.metadata_snapshot()
    }

    /// Forget every cached talent identity
    pub fn clear_name_cache(&self) -> Result<()> {
        self.resolver.clear()
    }

    /// Encode one loadout
    ///
    /// The three strings are `name:rank` lists separated by `/`. The spec
    /// name is matched case-insensitively against the loaded trees.
    pub fn generate(&self, hero: &str, class: &str, spec: &str, spec_name: &str) -> Result<String> {
        let loadout = ParsedLoadout::parse(hero, class, spec)?;
        let snapshot = self.metadata_snapshot()?;
        let tree = snapshot.tree(spec_name)?;

        if loadout.is_empty() {
            return Ok(LoadoutEncoder::encode_empty());
        }

        let resolved = self.resolve_loadout(&loadout)?;
        let selections = SelectionSet::from_tokens(loadout.tokens(), &resolved);
        let hero_choice = detect_hero_choice(&loadout.hero, &self.config.class, spec_name)?;

        debug!(
            spec = spec_name,
            nodes = selections.len(),
            ?hero_choice,
            "Encoding loadout"
        );
        Ok(self.encoder.encode(&tree, &selections, hero_choice))
    }

    /// Resolve every talent name, failing on the first unresolved token
    fn resolve_loadout(&self, loadout: &ParsedLoadout) -> Result<AHashMap<String, TalentId>> {
        let results = self.resolver.resolve_batch(loadout.unique_names());

        if self.resolver.cache().is_dirty() {
            if let Err(e) = self.resolver.persist() {
                warn!(
                    error = %e,
                    "Talent name cache not saved; later runs will repeat these lookups"
                );
            }
        }

        let mut resolved = AHashMap::with_capacity(results.len());
        let mut failures = AHashMap::new();
        for (name, result) in results {
            match result {
                Ok(id) => {
                    resolved.insert(name, id);
                }
                Err(e) => {
                    failures.insert(name, e);
                }
            }
        }

        // Report failures in input order so the error is deterministic
        for token in loadout.tokens() {
            if let Some(e) = failures.remove(&token.name) {
                return Err(e);
            }
        }

        Ok(resolved)
    }
}
