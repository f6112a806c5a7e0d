//! Merge engine: fold incremental snapshots into a full backup
//!
//! Snapshots are applied to a working copy of the latest backup in
//! chronological order. The snapshot wins: a captured family replaces that
//! family's qualifier histories wholesale, and null markers delete the row
//! or family they name. After folding, qualifiers whose newest value is an
//! already-expired tombstone are purged, a new backup is written, and the
//! merged snapshot files are deleted.

use celltable_core::{sort_history, Data, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::backup::BackupStore;
use crate::snapshot::{IncrementalSnapshot, SnapshotStore};

/// Fold one snapshot into the working copy.
pub fn apply_snapshot(working: &mut Data, snapshot: IncrementalSnapshot) {
    for (row_key, row_entry) in snapshot.snapshot_data {
        match row_entry {
            None => {
                working.remove(&row_key);
            }
            Some(families) => {
                let row = working.entry(row_key.clone()).or_default();
                for (family, family_entry) in families {
                    match family_entry {
                        None => {
                            row.remove(&family);
                        }
                        Some(contents) => {
                            row.insert(family, contents);
                        }
                    }
                }
                if row.is_empty() {
                    working.remove(&row_key);
                }
            }
        }
    }
}

/// Drop every qualifier whose newest value is a tombstone whose expiry has
/// passed, cascading empty families and rows away.
pub fn purge_expired(working: &mut Data, now: i64) {
    working.retain(|_, row| {
        row.retain(|_, family| {
            family.retain(|_, history| {
                sort_history(history);
                match history.first() {
                    Some(newest) => !newest.is_expired(now),
                    None => false,
                }
            });
            !family.is_empty()
        });
        !row.is_empty()
    });
}

/// Run one merge pass.
///
/// With no incremental files the existing backup is left untouched and
/// `None` is returned. Otherwise the new backup's path is returned; the
/// merged incremental files are gone by then. A snapshot file that fails
/// to load is skipped with a warning rather than wedging the merge loop.
pub fn merge_snapshots(
    snapshots: &SnapshotStore,
    backups: &BackupStore,
    now: i64,
) -> Result<Option<PathBuf>> {
    let files = snapshots.list()?;
    if files.is_empty() {
        return Ok(None);
    }

    let mut working = backups.load_latest()?.unwrap_or_default();

    let mut merged: Vec<PathBuf> = Vec::new();
    for path in files {
        match snapshots.load(&path) {
            Ok(snapshot) => {
                apply_snapshot(&mut working, snapshot);
                merged.push(path);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable snapshot");
                merged.push(path);
            }
        }
    }

    purge_expired(&mut working, now);

    let backup_path = backups.save(&working, now)?;
    snapshots.remove(&merged)?;
    info!(
        merged = merged.len(),
        rows = working.len(),
        "merged incremental snapshots into backup"
    );
    Ok(Some(backup_path))
}
