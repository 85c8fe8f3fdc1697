//! Persistent resolution cache.
//!
//! The cache maps canonical identifier strings to the [`MatchResult`] they
//! resolved to. It is stored as one JSON object (`key -> entry`) and shared by
//! every resolution worker in the process.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::errors::{GeoMatchError, Result};
use crate::types::{current_timestamp, CacheEntry, MatchResult};

/// Distinguishes temporary files written by concurrent flushes.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

type Entries = BTreeMap<String, CacheEntry>;

/// Key → result store with write-through persistence.
///
/// Unreadable or corrupt cache files degrade to an empty cache. Every flush
/// merges with the current file content, writes a temporary sibling file, and
/// renames it into place, so readers never observe a truncated file.
///
/// Merging only adopts keys missing from memory. A removal made through
/// another instance (for example `geomatch cache clear` while a resolver is
/// running) is undone by this instance's next `put` for every entry it still
/// holds. Clear or invalidate through the running instance, or restart it.
pub struct ResolutionCache {
    path: Option<PathBuf>,
    entries: Mutex<Entries>,
    flush_lock: Mutex<()>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResolutionCache {
    /// Opens the cache at `path`. A missing file yields an empty cache.
    pub fn open(path: &Path) -> Self {
        let entries = if path.exists() {
            match read_entries(path) {
                Ok(entries) => {
                    info!(path = %path.display(), entries = entries.len(), "loaded resolution cache");
                    entries
                }
                Err(e) => {
                    warn!(error = %e, "resolution cache unreadable; starting empty");
                    Entries::new()
                }
            }
        } else {
            debug!(path = %path.display(), "no resolution cache file; starting empty");
            Entries::new()
        };

        Self {
            path: Some(path.to_path_buf()),
            entries: Mutex::new(entries),
            flush_lock: Mutex::new(()),
        }
    }

    /// A cache that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Entries::new()),
            flush_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        lock(&self.entries).get(key).cloned()
    }

    /// Stores `result` under `key` and flushes. Flush failures are logged;
    /// the in-memory entry is kept either way.
    pub fn put(&self, key: &str, result: MatchResult) -> CacheEntry {
        let entry = CacheEntry {
            key: key.to_string(),
            result,
            created_at: current_timestamp(),
        };
        lock(&self.entries).insert(key.to_string(), entry.clone());

        if let Err(e) = self.persist(true) {
            warn!(error = %e, key, "failed to flush resolution cache");
        }
        entry
    }

    /// Removes one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> Result<bool> {
        let removed = lock(&self.entries).remove(key).is_some();
        if removed {
            self.persist(false)?;
        }
        Ok(removed)
    }

    /// Removes every entry and overwrites the file.
    pub fn clear(&self) -> Result<()> {
        lock(&self.entries).clear();
        self.persist(false)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries in key order.
    pub fn entries(&self) -> Vec<CacheEntry> {
        lock(&self.entries).values().cloned().collect()
    }

    /// Writes the cache to disk, merging entries other writers added.
    pub fn flush(&self) -> Result<()> {
        self.persist(true)
    }

    /// Writes the current entries. With `merge`, entries present on disk but
    /// not in memory are adopted first; without it the file is replaced with
    /// exactly the in-memory state.
    fn persist(&self, merge: bool) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = lock(&self.flush_lock);

        if merge && path.exists() {
            match read_entries(path) {
                Ok(on_disk) => {
                    let mut entries = lock(&self.entries);
                    for (key, entry) in on_disk {
                        entries.entry(key).or_insert(entry);
                    }
                }
                Err(e) => warn!(error = %e, "ignoring unreadable cache file during merge"),
            }
        }

        let snapshot = lock(&self.entries).clone();
        write_atomic(path, &snapshot)?;
        debug!(path = %path.display(), entries = snapshot.len(), "flushed resolution cache");
        Ok(())
    }
}

fn cache_error(path: &Path, message: String) -> GeoMatchError {
    GeoMatchError::Cache {
        message,
        path: path.display().to_string(),
    }
}

fn read_entries(path: &Path) -> Result<Entries> {
    let contents = fs::read_to_string(path)
        .map_err(|e| cache_error(path, format!("failed to read cache: {e}")))?;
    if contents.trim().is_empty() {
        return Ok(Entries::new());
    }
    serde_json::from_str(&contents).map_err(|e| cache_error(path, format!("failed to parse cache: {e}")))
}

fn write_atomic(path: &Path, entries: &Entries) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| cache_error(path, format!("failed to create cache directory: {e}")))?;
    }

    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| cache_error(path, format!("failed to serialize cache: {e}")))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "cache".to_string());
    let tmp_path = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp_path, json)
        .map_err(|e| cache_error(path, format!("failed to write temporary cache file: {e}")))?;

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(cache_error(path, format!("failed to replace cache file: {e}")));
    }
    Ok(())
}
