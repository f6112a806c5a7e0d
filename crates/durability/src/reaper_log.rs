//! Durable queue of pending tombstone collections
//!
//! Every tombstone placement and every TTL'd write appends one JSON line
//! here; the sweep loop reads the whole file, reclaims what has expired,
//! and rewrites the file with only the still-pending entries. The file is
//! the source of truth for pending GC work across restarts.
//!
//! The internal lock guards only file operations — it is never held while
//! calling into the shard store.

use celltable_core::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One pending collection, actionable once `expires_at` has passed:
/// reclaim the named qualifiers up to `timestamp`, or the whole family
/// when `qualifiers` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaperEntry {
    /// Target row.
    #[serde(rename = "rowKey")]
    pub row_key: String,
    /// Target family.
    pub family: String,
    /// Target qualifiers; empty means the whole family.
    pub qualifiers: Vec<String>,
    /// Tombstone placement time; the reclamation threshold.
    pub timestamp: i64,
    /// Earliest time physical reclamation may occur.
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

/// Append/rewrite access to the reaper queue file.
pub struct ReaperLog {
    path: PathBuf,
    file_lock: Mutex<()>,
}

impl ReaperLog {
    /// Create a log over `path`. The file is created on first append.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file_lock: Mutex::new(()),
        }
    }

    /// Append one entry, flushed to the OS before returning.
    pub fn append(&self, entry: &ReaperEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.file_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    /// Read every entry in file order. An absent file is an empty queue.
    pub fn read_all(&self) -> Result<Vec<ReaperEntry>> {
        let _guard = self.file_lock.lock();
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
            let entry: ReaperEntry = serde_json::from_str(&line).map_err(|e| {
                Error::Corruption(format!("reaper log line {} failed to parse: {e}", idx + 1))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Replace the file contents with `pending`, preserving their order,
    /// fsync'd before return.
    pub fn rewrite(&self, pending: &[ReaperEntry]) -> Result<()> {
        let _guard = self.file_lock.lock();
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            for entry in pending {
                let mut line = serde_json::to_string(entry)?;
                line.push('\n');
                file.write_all(line.as_bytes())?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(pending = pending.len(), "rewrote reaper log");
        Ok(())
    }

    /// Path of the queue file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
