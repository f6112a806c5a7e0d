//! Incremental snapshot files
//!
//! An incremental snapshot captures just the rows dirtied since the last
//! flush. A `null` row records that the row vanished from memory; a `null`
//! family records the same for one family. File names embed a zero-padded
//! nanosecond timestamp (`ss-incr-<nanos>.db`) so lexicographic listing is
//! chronological.

use celltable_core::{Error, Family, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::layout::padded_nanos;

const FILE_PREFIX: &str = "ss-incr-";
const FILE_SUFFIX: &str = ".db";

/// Snapshot payload: row → `null` (deleted row) or family → `null`
/// (deleted family) or qualifier histories.
pub type SnapshotData = HashMap<String, Option<HashMap<String, Option<Family>>>>;

/// One incremental snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalSnapshot {
    /// Format version; currently always 1.
    pub version: u32,
    /// Capture time in nanoseconds; also the file-name suffix.
    #[serde(rename = "snapshotTimestamp")]
    pub snapshot_timestamp: i64,
    /// Captured rows and deletion markers.
    #[serde(rename = "snapshotData")]
    pub snapshot_data: SnapshotData,
}

impl IncrementalSnapshot {
    /// Create a version-1 snapshot captured at `timestamp`.
    pub fn new(timestamp: i64, data: SnapshotData) -> Self {
        Self {
            version: 1,
            snapshot_timestamp: timestamp,
            snapshot_data: data,
        }
    }
}

/// Reads and writes `ss-incr-*.db` files in one directory.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store over `dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Write one snapshot file (write-fsync-rename) and return its path.
    pub fn write(&self, snapshot: &IncrementalSnapshot) -> Result<PathBuf> {
        let name = format!(
            "{FILE_PREFIX}{}{FILE_SUFFIX}",
            padded_nanos(snapshot.snapshot_timestamp)
        );
        let path = self.dir.join(&name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(serde_json::to_string(snapshot)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(rows = snapshot.snapshot_data.len(), file = %name, "wrote incremental snapshot");
        Ok(path)
    }

    /// List snapshot files in lexicographic (hence chronological) order.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_SUFFIX))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Load one snapshot file.
    pub fn load(&self, path: &Path) -> Result<IncrementalSnapshot> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Corruption(format!("incremental snapshot failed to parse: {e}")))
    }

    /// Delete the given snapshot files.
    pub fn remove(&self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Directory holding the snapshot files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
