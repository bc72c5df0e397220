//! Sync state persistence
//!
//! The cache is a single JSON document holding the sync token and the
//! committed entities of every kind. Uses atomic writes (write to temp file,
//! then rename) so an interrupted save never leaves a truncated cache.
//!
//! Storage location: `~/.local/share/todoist/cache.json` (configurable via
//! `Config`)

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use crate::config::Config;
use crate::sync::SyncState;

/// Where the committed state lives between runs
pub trait Persistence {
    /// Load the last saved state, `None` if nothing was saved yet
    fn load(&self) -> StorageResult<Option<SyncState>>;

    /// Replace the saved state
    fn save(&self, state: &SyncState) -> StorageResult<()>;
}

/// JSON file persistence
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Persistence at the configured cache path
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a cache exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove the cache file if present
    pub fn delete(&self) -> StorageResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| StorageError::from_io(e, self.path.clone()))?;
        }
        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        PathBuf::from(name)
    }
}

impl Persistence for FilePersistence {
    /// Returns `None` if the cache file doesn't exist.
    /// A file that exists but can't be decoded is moved aside and reported.
    fn load(&self) -> StorageResult<Option<SyncState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path).map_err(|e| StorageError::from_read(e, self.path.clone()))?;

        match serde_json::from_slice(&bytes) {
            Ok(state) => {
                debug!(path = ?self.path, "loaded cache");
                Ok(Some(state))
            }
            Err(e) => {
                let backup_path = self.backup_path();
                warn!(path = ?self.path, backup = ?backup_path, error = %e, "cache is corrupted");
                fs::rename(&self.path, &backup_path).map_err(|source| {
                    StorageError::AtomicWriteFailed {
                        from: self.path.clone(),
                        to: backup_path.clone(),
                        source,
                    }
                })?;
                Err(StorageError::CorruptCache {
                    path: self.path.clone(),
                    backup_path,
                    details: e.to_string(),
                })
            }
        }
    }

    fn save(&self, state: &SyncState) -> StorageResult<()> {
        let bytes = serde_json::to_vec(state)?;
        atomic_write(&self.path, &bytes)?;
        debug!(path = ?self.path, bytes = bytes.len(), "saved cache");
        Ok(())
    }
}

/// In-memory persistence for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    state: RefCell<Option<SyncState>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing state
    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: RefCell::new(Some(state)),
        }
    }

    /// Copy of the last saved state
    pub fn snapshot(&self) -> Option<SyncState> {
        self.state.borrow().clone()
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> StorageResult<Option<SyncState>> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &SyncState) -> StorageResult<()> {
        *self.state.borrow_mut() = Some(state.clone());
        Ok(())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // Same directory so the rename stays on one filesystem
    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
