//! Append-only CSV logs
//!
//! The header row is written when the file is created; every later write
//! appends exactly one record. Column names match the files the admin
//! dashboard and the reminder job read.

use super::snapshot::remove_if_exists;
use super::{FileLock, StorageError};
use chrono::{DateTime, NaiveDateTime};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Timestamp format used in every CSV column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One handled inbound message and the reply given to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub timestamp: String,
    #[serde(rename = "telefone")]
    pub phone: String,
    #[serde(rename = "mensagem")]
    pub message: String,
    #[serde(rename = "resposta")]
    pub reply: String,
}

impl LeadRecord {
    pub fn new(at: NaiveDateTime, phone: &str, message: &str, reply: &str) -> Self {
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            phone: phone.to_string(),
            message: message.to_string(),
            reply: reply.to_string(),
        }
    }
}

/// A confirmed booking, later used for day-before reminders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentLogEntry {
    #[serde(rename = "timestamp_log")]
    pub logged_at: String,
    #[serde(rename = "telefone")]
    pub phone: String,
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "carro")]
    pub model: String,
    #[serde(rename = "cidade")]
    pub city: String,
    pub start_iso: String,
    pub event_id: String,
}

impl AppointmentLogEntry {
    /// Parse `start_iso`, accepting both naive and offset-qualified stamps
    pub fn start(&self) -> Option<NaiveDateTime> {
        let raw = self.start_iso.trim();
        raw.parse::<NaiveDateTime>()
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
    }
}

/// Header plus data rows, as raw strings (for the admin tables)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// CSV file with a header row and append-only records
#[derive(Clone)]
pub struct CsvLog {
    path: PathBuf,
    lock: FileLock,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>, lock: FileLock) -> Self {
        Self {
            path: path.into(),
            lock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one record, writing the header first if the file is new
    pub fn append<T: Serialize>(&self, record: &T) -> Result<(), StorageError> {
        self.lock.with(|| -> Result<(), StorageError> {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let is_new = !self.path.exists();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;

            let mut writer = csv::WriterBuilder::new()
                .has_headers(is_new)
                .from_writer(file);
            writer.serialize(record)?;
            writer.flush()?;
            Ok(())
        })
    }

    /// Deserialize every record. Rows that fail to parse are logged and skipped.
    pub fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut out = Vec::new();
        for (i, row) in reader.deserialize::<T>().enumerate() {
            match row {
                Ok(record) => out.push(record),
                Err(e) => warn!("Skipping malformed row {} in {}: {}", i + 1, self.path.display(), e),
            }
        }
        Ok(out)
    }

    /// Raw header and rows. `None` when the file does not exist.
    pub fn read_table(&self) -> Result<Option<CsvTable>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let mut records = reader.records();
        let header = match records.next() {
            Some(first) => first?.iter().map(str::to_string).collect(),
            None => return Ok(Some(CsvTable::default())),
        };
        let mut rows = Vec::new();
        for record in records {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Some(CsvTable { header, rows }))
    }

    /// Number of data rows (header excluded); 0 when missing
    pub fn count(&self) -> Result<usize, StorageError> {
        if !self.path.exists() {
            return Ok(0);
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut n = 0;
        for record in reader.records() {
            record?;
            n += 1;
        }
        Ok(n)
    }

    /// Raw file contents, `None` when missing
    pub fn read_raw(&self) -> Result<Option<String>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    /// Delete the log. Returns whether a file was removed.
    pub fn remove(&self) -> Result<bool, StorageError> {
        self.lock.with(|| remove_if_exists(&self.path))
    }
}
