//! Full backups with bounded retention
//!
//! A backup is the complete materialized `Data` as one JSON file,
//! `backup-<nanos>.db`, produced by the merge engine. At most `M` backups
//! are retained; pruning removes the lexicographically (chronologically)
//! smallest.

use celltable_core::{Data, Error, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::layout::padded_nanos;

const FILE_PREFIX: &str = "backup-";
const FILE_SUFFIX: &str = ".db";

/// Reads and writes `backup-*.db` files in one directory.
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    /// Create a store over `dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Write `data` as a new backup stamped `nanos` (write-fsync-rename).
    pub fn save(&self, data: &Data, nanos: i64) -> Result<PathBuf> {
        let name = format!("{FILE_PREFIX}{}{FILE_SUFFIX}", padded_nanos(nanos));
        let path = self.dir.join(&name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(serde_json::to_string(data)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(rows = data.len(), file = %name, "wrote backup");
        Ok(path)
    }

    /// List backup files in lexicographic (chronological) order.
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

    /// Path of the most recent backup, if any.
    pub fn latest(&self) -> Result<Option<PathBuf>> {
        Ok(self.list()?.into_iter().last())
    }

    /// Load one backup file.
    pub fn load(&self, path: &Path) -> Result<Data> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Corruption(format!("backup failed to parse: {e}")))
    }

    /// Load the most recent backup, or `None` when none exists.
    pub fn load_latest(&self) -> Result<Option<Data>> {
        match self.latest()? {
            Some(path) => Ok(Some(self.load(&path)?)),
            None => Ok(None),
        }
    }

    /// Delete the oldest backups until at most `max` remain. Returns the
    /// removed paths.
    pub fn prune(&self, max: usize) -> Result<Vec<PathBuf>> {
        let files = self.list()?;
        if files.len() <= max {
            return Ok(Vec::new());
        }

        let excess = files.len() - max;
        let removed: Vec<PathBuf> = files.into_iter().take(excess).collect();
        for path in &removed {
            fs::remove_file(path)?;
        }
        info!(removed = removed.len(), kept = max, "pruned backups");
        Ok(removed)
    }

    /// Directory holding the backup files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
