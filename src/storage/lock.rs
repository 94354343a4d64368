//! Cross-process exclusive locks behind a swappable capability
//!
//! Several independent processes may hash talents against the same data
//! directory, so an in-process mutex is not enough. `FsLocker` uses OS
//! advisory locks on a sibling `.lock` file; `MemoryLocker` gives tests the
//! same semantics without touching the filesystem.

use crate::core::error::{HashError, Result};
use std::any::Any;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

/// Held lock; released when dropped
pub struct LockGuard {
    _held: Box<dyn Any + Send>,
}

impl LockGuard {
    fn new<T: Any + Send>(held: T) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LockGuard")
    }
}

/// Exclusive lock provider keyed by lock-file path
pub trait FileLocker: Send + Sync {
    /// Block until the lock is held
    fn acquire_exclusive(&self, path: &Path) -> Result<LockGuard>;

    /// Take the lock if it is free; `Ok(None)` when another holder has it
    fn try_acquire_exclusive(&self, path: &Path) -> Result<Option<LockGuard>>;
}

/// Lock-file path that sits next to a cache artifact (`foo.json.lock`)
pub fn sibling_lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// OS advisory file locks via `fs2`
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLocker;

impl FsLocker {
    fn open(path: &Path) -> Result<File> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        Ok(file)
    }
}

impl FileLocker for FsLocker {
    fn acquire_exclusive(&self, path: &Path) -> Result<LockGuard> {
        use fs2::FileExt;
        let file = Self::open(path)?;
        file.lock_exclusive()
            .map_err(|e| HashError::Lock(format!("failed to lock {}: {}", path.display(), e)))?;
        // Closing the file releases the advisory lock
        Ok(LockGuard::new(file))
    }

    fn try_acquire_exclusive(&self, path: &Path) -> Result<Option<LockGuard>> {
        use fs2::FileExt;
        let file = Self::open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(LockGuard::new(file))),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(HashError::Lock(format!(
                "failed to lock {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[derive(Default)]
struct HeldPaths {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

/// In-process lock table with the same contract as `FsLocker`
#[derive(Clone, Default)]
pub struct MemoryLocker {
    inner: Arc<HeldPaths>,
}

impl MemoryLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether some guard for `path` is currently alive
    pub fn is_held(&self, path: &Path) -> bool {
        self.inner
            .held
            .lock()
            .map(|held| held.contains(path))
            .unwrap_or(false)
    }

    fn poisoned() -> HashError {
        HashError::Lock("lock table poisoned".into())
    }
}

struct MemoryHold {
    inner: Arc<HeldPaths>,
    path: PathBuf,
}

impl Drop for MemoryHold {
    fn drop(&mut self) {
        if let Ok(mut held) = self.inner.held.lock() {
            held.remove(&self.path);
        }
        self.inner.released.notify_all();
    }
}

impl FileLocker for MemoryLocker {
    fn acquire_exclusive(&self, path: &Path) -> Result<LockGuard> {
        let mut held = self.inner.held.lock().map_err(|_| Self::poisoned())?;
        while held.contains(path) {
            held = self
                .inner
                .released
                .wait(held)
                .map_err(|_| Self::poisoned())?;
        }
        held.insert(path.to_path_buf());
        Ok(LockGuard::new(MemoryHold {
            inner: Arc::clone(&self.inner),
            path: path.to_path_buf(),
        }))
    }

    fn try_acquire_exclusive(&self, path: &Path) -> Result<Option<LockGuard>> {
        let mut held = self.inner.held.lock().map_err(|_| Self::poisoned())?;
        if !held.insert(path.to_path_buf()) {
            return Ok(None);
        }
        Ok(Some(LockGuard::new(MemoryHold {
            inner: Arc::clone(&self.inner),
            path: path.to_path_buf(),
        })))
    }
}
