//! Durable cache plumbing shared by the metadata, name and hash caches

pub mod file;
pub mod lock;

pub use file::{file_age, read_json, read_json_if_fresh, remove_if_exists, write_json_atomic};
pub use lock::{sibling_lock_path, FileLocker, FsLocker, LockGuard, MemoryLocker};
