//! Column family registry
//!
//! The registry is the persisted allow-list of column families. A family
//! not in the list rejects every read and write. Families can be added but
//! never removed through this API.
//!
//! The list is stored as a JSON array of strings and replaced atomically
//! (write to a temp file, fsync, rename) so concurrent readers observe
//! either the old or the new list, never a torn file.

use celltable_core::{Error, Result};
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Persisted, ordered, duplicate-free list of allowed family names.
#[derive(Debug)]
pub struct FamilyRegistry {
    path: PathBuf,
    families: RwLock<Vec<String>>,
}

impl FamilyRegistry {
    /// Load the registry from `path`.
    ///
    /// An absent file yields an empty registry. A present but malformed
    /// file is a fatal startup error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let families = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str::<Vec<String>>(&raw).map_err(|e| {
                Error::Corruption(format!("family registry failed to parse: {e}"))
            })?
        } else {
            Vec::new()
        };

        info!(count = families.len(), "loaded family registry");
        Ok(Self {
            path,
            families: RwLock::new(families),
        })
    }

    /// Check whether `name` is an allowed family.
    ///
    /// Linear scan; the registry stays small.
    pub fn is_allowed(&self, name: &str) -> bool {
        self.families.read().iter().any(|f| f == name)
    }

    /// Current list of allowed families.
    pub fn families(&self) -> Vec<String> {
        self.families.read().clone()
    }

    /// Merge `new_names` into the registry and persist atomically.
    ///
    /// Names are whitespace-trimmed; empty names are dropped silently;
    /// duplicates (against the existing list and within the input) are
    /// ignored. An input that leaves nothing to consider is invalid.
    pub fn update_families(&self, new_names: &[String]) -> Result<()> {
        if new_names.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one family name is required".to_string(),
            ));
        }

        let mut families = self.families.write();
        let mut merged = families.clone();
        for name in new_names {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !merged.iter().any(|f| f == trimmed) {
                merged.push(trimmed.to_string());
            }
        }

        self.persist(&merged)?;
        debug!(count = merged.len(), "family registry updated");
        *families = merged;
        Ok(())
    }

    // Write-then-rename so readers never see a partial file.
    fn persist(&self, families: &[String]) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(serde_json::to_string(families)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
