//! JSON cache artifacts: freshness checks and atomic replacement

use crate::core::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

/// Time since the file was last modified, `None` if it does not exist
pub fn file_age(path: &Path) -> Result<Option<Duration>> {
    let modified = match fs::metadata(path) {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    // A clock step backwards makes the file look brand new
    Ok(Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    ))
}

/// Read and parse a JSON file, `None` if it does not exist
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read a JSON file only if it was written within `max_age`
pub fn read_json_if_fresh<T: DeserializeOwned>(path: &Path, max_age: Duration) -> Result<Option<T>> {
    match file_age(path)? {
        Some(age) if age <= max_age => read_json(path),
        _ => Ok(None),
    }
}

/// Serialize to a temp file in the target directory, then rename over `path`
///
/// Readers see either the old file or the new one, never a truncated write.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, value)?;
    tmp.flush()?;
    // On failure the temp file is removed when the error drops it
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Delete a file, treating "already gone" as success
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
