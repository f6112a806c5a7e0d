//! Durability layer for Celltable
//!
//! Everything that touches disk lives here:
//! - `wal`: the append-only write-ahead log gating every mutation
//! - `reaper_log`: the durable queue of pending tombstone collections
//! - `snapshot`: incremental snapshot files (`ss-incr-*.db`)
//! - `backup`: full backups (`backup-*.db`) with bounded retention
//! - `merge`: folding incremental snapshots into a backup
//! - `layout`: the on-disk directory layout under the data root
//!
//! All formats are self-describing JSON. Exclusive file replacement uses
//! write-then-rename so readers never observe a torn file.

#![warn(missing_docs)]

pub mod backup;
pub mod layout;
pub mod merge;
pub mod reaper_log;
pub mod snapshot;
pub mod wal;

pub use backup::BackupStore;
pub use merge::{apply_snapshot, merge_snapshots, purge_expired};
pub use reaper_log::{ReaperEntry, ReaperLog};
pub use snapshot::{IncrementalSnapshot, SnapshotData, SnapshotStore};
pub use wal::{Wal, WalEntry, WalOperation, WalReader};
