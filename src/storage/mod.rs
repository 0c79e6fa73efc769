//! Flat-file persistence
//!
//! - `SnapshotFile`: durable key-value snapshot (JSON, write-temp-then-rename)
//! - `CsvLog`: append-only CSV logs with a header row (leads, appointments)
//!
//! All writes go through one process-wide `FileLock` so a snapshot rewrite and
//! a CSV append never interleave on disk.

pub mod csv_log;
pub mod snapshot;

pub use csv_log::{AppointmentLogEntry, CsvLog, CsvTable, LeadRecord};
pub use snapshot::SnapshotFile;

use parking_lot::Mutex;
use std::sync::Arc;

/// Error types for file persistence
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Shared lock serializing every file write
#[derive(Clone, Default)]
pub struct FileLock(Arc<Mutex<()>>);

impl FileLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the write lock
    pub fn with<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.0.lock();
        f()
    }
}
