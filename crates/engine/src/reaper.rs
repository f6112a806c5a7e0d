//! Tombstone reaper
//!
//! Works through the durable queue of pending collections. Each sweep
//! reads the whole log, reclaims every entry whose expiry has passed via
//! the shard store, marks the affected rows dirty so the snapshot engine
//! captures the removal, and rewrites the log with only the entries that
//! are still pending.
//!
//! Entries are processed in log order, so reclamation within a row stays
//! monotone. The log's internal lock is never held across a store call.

use celltable_core::{now_nanos, Result};
use celltable_durability::ReaperLog;
use celltable_storage::ShardedStore;
use std::sync::Arc;
use tracing::{debug, info};

/// The sweep pass over the reaper queue.
pub struct Reaper {
    store: Arc<ShardedStore>,
    log: Arc<ReaperLog>,
}

impl Reaper {
    /// Create a reaper over the store and its queue.
    pub fn new(store: Arc<ShardedStore>, log: Arc<ReaperLog>) -> Self {
        Self { store, log }
    }

    /// Run one sweep. Returns the number of entries collected.
    pub fn sweep(&self) -> Result<usize> {
        let entries = self.log.read_all()?;
        if entries.is_empty() {
            return Ok(0);
        }

        let now = now_nanos();
        let (expired, pending): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| now > e.expires_at);
        if expired.is_empty() {
            return Ok(0);
        }

        for entry in &expired {
            let removed = self.store.delete_expired_tombstones(
                &entry.row_key,
                &entry.family,
                &entry.qualifiers,
                entry.timestamp,
            );
            if removed {
                self.store
                    .dirty()
                    .mark(&entry.row_key, [entry.family.clone()]);
                debug!(
                    row_key = %entry.row_key,
                    family = %entry.family,
                    "reclaimed expired tombstones"
                );
            }
        }

        self.log.rewrite(&pending)?;
        info!(collected = expired.len(), pending = pending.len(), "reaper sweep complete");
        Ok(expired.len())
    }
}
