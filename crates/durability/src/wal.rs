//! Write-ahead log
//!
//! Every mutation is recorded here before it touches a shard. One JSON
//! object per line; parallel callers serialize on the log's own lock.
//! An append that fails is fatal for its mutation — the in-memory store
//! must not apply a change whose WAL record did not reach disk.
//!
//! READ operations and rejected/unknown operations never enter the log.
//!
//! `WalReader` walks an existing log back into entries. Nothing in the
//! runtime replays yet; recovery comes from backups, and the reader exists
//! so log-based replay can be layered on top.

use celltable_core::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Operation kinds recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalOperation {
    /// Family registry update.
    #[serde(rename = "CREATE-FAMILY")]
    CreateFamily,
    /// Cell write (including TTL'd writes).
    #[serde(rename = "WRITE")]
    Write,
    /// Tombstone placement.
    #[serde(rename = "DELETE")]
    Delete,
}

/// One durable record: the operation kind, the raw mutation text, and the
/// wall-clock time the record was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Operation kind.
    pub operation: WalOperation,
    /// Raw mutation text as received by the operations layer.
    pub query: String,
    /// Nanoseconds since epoch.
    pub timestamp: i64,
}

impl WalEntry {
    /// Create an entry stamped with `timestamp`.
    pub fn new(operation: WalOperation, query: impl Into<String>, timestamp: i64) -> Self {
        Self {
            operation,
            query: query.into(),
            timestamp,
        }
    }
}

/// Append-only single-writer log file.
pub struct Wal {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl Wal {
    /// Open the log at `path` in append mode, creating parent directories
    /// as needed. Existing contents are left in place.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "opened write-ahead log");
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one entry as a JSON line and flush it to the OS before
    /// returning. Errors propagate to the caller as fatal for the mutation.
    pub fn append(&self, entry: &WalEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Flush and fsync everything buffered so far.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        let _ = self.sync();
    }
}

/// Reads a WAL file back into entries.
pub struct WalReader {
    path: PathBuf,
}

impl WalReader {
    /// Create a reader over the log at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read every entry in file order.
    ///
    /// An absent file yields an empty list; blank lines are skipped; a
    /// malformed line is corruption.
    pub fn entries(&self) -> Result<Vec<WalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: WalEntry = serde_json::from_str(&line).map_err(|e| {
                Error::Corruption(format!("WAL line {} failed to parse: {e}", idx + 1))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
