//! Durable JSON snapshot
//!
//! The whole value is rewritten on every save: serialized into `<path>.tmp`,
//! then renamed over `<path>`. A crash mid-write leaves the previous snapshot
//! intact.

use super::{FileLock, StorageError};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// A single JSON document on disk
#[derive(Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    lock: FileLock,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>, lock: FileLock) -> Self {
        Self {
            path: path.into(),
            lock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Read the snapshot. Missing or unreadable files yield `T::default()`.
    pub fn load_or_default<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        if !self.path.exists() {
            return T::default();
        }
        match self.load::<T>() {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to load {}: {}", self.path.display(), e);
                T::default()
            }
        }
    }

    fn load<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Atomically replace the snapshot with `value`
    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), StorageError> {
        self.save_with(|| value)
    }

    /// Like `save`, but `current` is called under the write lock, so the
    /// last writer always stores the newest state.
    pub fn save_with<T, F>(&self, current: F) -> Result<(), StorageError>
    where
        T: Serialize,
        F: FnOnce() -> T,
    {
        let tmp = self.tmp_path();

        self.lock.with(|| -> Result<(), StorageError> {
            let payload = serde_json::to_string_pretty(&current())?;
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let mut file = fs::File::create(&tmp)?;
            file.write_all(payload.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)?;
            Ok(())
        })?;

        debug!("Snapshot written: {}", self.path.display());
        Ok(())
    }

    /// Delete the snapshot file. Returns whether a file was removed.
    pub fn remove(&self) -> Result<bool, StorageError> {
        self.lock.with(|| remove_if_exists(&self.path))
    }
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
