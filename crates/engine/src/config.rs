//! Database configuration via `celltable.toml`
//!
//! Configuration lives in a TOML file in the data root. On open, defaults
//! are used for anything the file omits; to change settings, edit the file
//! and restart. Numeric options are clamped to their valid ranges rather
//! than rejected.

use celltable_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name placed in the data root directory.
pub const CONFIG_FILE_NAME: &str = "celltable.toml";

/// Storage core configuration.
///
/// # Example
///
/// ```toml
/// shard_count = 8
/// snapshot_timer_s = 2
/// backup_timer_s = 60
/// max_snapshot_limit = 10
/// gc_interval_s = 10
/// default_tombstone_ttl_s = 3600
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base directory for all on-disk state.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Number of shards, in [1, 50]. Fixed for the process lifetime.
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,
    /// Seconds between incremental snapshot flushes.
    #[serde(default = "default_snapshot_timer_s")]
    pub snapshot_timer_s: u64,
    /// Base merge cadence in seconds; the merge worker runs at 1.5× this.
    #[serde(default = "default_backup_timer_s")]
    pub backup_timer_s: u64,
    /// Maximum retained backups, in [1, 50].
    #[serde(default = "default_max_snapshot_limit")]
    pub max_snapshot_limit: usize,
    /// Seconds between reaper sweeps.
    #[serde(default = "default_gc_interval_s")]
    pub gc_interval_s: u64,
    /// TTL in seconds applied to DELETE operations that carry none.
    #[serde(default = "default_tombstone_ttl_s")]
    pub default_tombstone_ttl_s: i64,
    /// Deadline in seconds for the shutdown sequence.
    #[serde(default = "default_shutdown_timeout_s")]
    pub shutdown_timeout_s: u64,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("./celltable-data")
}
fn default_shard_count() -> usize {
    4
}
fn default_snapshot_timer_s() -> u64 {
    2
}
fn default_backup_timer_s() -> u64 {
    60
}
fn default_max_snapshot_limit() -> usize {
    10
}
fn default_gc_interval_s() -> u64 {
    10
}
fn default_tombstone_ttl_s() -> i64 {
    3600
}
fn default_shutdown_timeout_s() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            shard_count: default_shard_count(),
            snapshot_timer_s: default_snapshot_timer_s(),
            backup_timer_s: default_backup_timer_s(),
            max_snapshot_limit: default_max_snapshot_limit(),
            gc_interval_s: default_gc_interval_s(),
            default_tombstone_ttl_s: default_tombstone_ttl_s(),
            shutdown_timeout_s: default_shutdown_timeout_s(),
        }
    }
}

impl StoreConfig {
    /// Config rooted at `root`, with every other option defaulted and the
    /// config file (if present under `root`) merged in.
    pub fn load_or_default<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let file = root.join(CONFIG_FILE_NAME);

        let mut config = if file.exists() {
            let raw = std::fs::read_to_string(&file)?;
            toml::from_str::<StoreConfig>(&raw)
                .map_err(|e| Error::InvalidArgument(format!("bad config file: {e}")))?
        } else {
            StoreConfig::default()
        };
        config.root_dir = root;
        config.clamp();
        Ok(config)
    }

    /// Clamp numeric options into their valid ranges.
    pub fn clamp(&mut self) {
        self.shard_count = self.shard_count.clamp(1, 50);
        self.max_snapshot_limit = self.max_snapshot_limit.clamp(1, 50);
        self.snapshot_timer_s = self.snapshot_timer_s.max(1);
        self.backup_timer_s = self.backup_timer_s.max(1);
        self.gc_interval_s = self.gc_interval_s.max(1);
        self.default_tombstone_ttl_s = self.default_tombstone_ttl_s.max(0);
        self.shutdown_timeout_s = self.shutdown_timeout_s.max(1);
    }

    /// The merge worker's interval: 1.5× the backup cadence.
    pub fn merge_interval_s(&self) -> u64 {
        self.backup_timer_s.saturating_mul(3) / 2
    }
}
