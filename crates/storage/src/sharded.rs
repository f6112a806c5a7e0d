//! Sharded in-memory data plane
//!
//! Rows are partitioned across a fixed number of shards by FNV-1a of the
//! row key, so placement is stable across restarts. Each shard owns its
//! submap behind its own reader-writer lock; there is no global lock.
//!
//! # Locking
//!
//! - Mutations take exactly one shard's write lock, never across I/O.
//! - Reads take a shard's read lock and clone out anything that escapes.
//! - Scans fan out one task per shard, each under its own read lock, and
//!   merge at the join point; the aggregate lock scope is staggered.
//! - The dirty set has its own lock, always acquired after the shard lock
//!   is released.

use celltable_core::{sort_history, Data, Error, Family, Result, Row, TimestampedValue};
use parking_lot::RwLock;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::dirty::DirtySet;
use crate::fnv::shard_index;

/// One in-memory partition of rows.
pub struct Shard {
    data: RwLock<Data>,
    initialized: AtomicBool,
}

impl Shard {
    fn new() -> Self {
        Self {
            data: RwLock::new(Data::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Number of rows held by this shard.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True when the shard holds no rows.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

/// Result of copying one row for an incremental snapshot.
///
/// `Missing` means the row is gone from memory (the snapshot records an
/// explicit null marker); a `None` family inside `Present` likewise marks
/// a family that vanished since it was dirtied.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSnapshot {
    /// The row is absent from its shard.
    Missing,
    /// Deep copies of the requested families; `None` marks an absent one.
    Present(HashMap<String, Option<Family>>),
}

/// Fixed-fan-out sharded store of rows.
pub struct ShardedStore {
    shards: Vec<Shard>,
    dirty: DirtySet,
}

impl ShardedStore {
    /// Create a store with `shard_count` shards.
    ///
    /// The count is fixed for the process lifetime; configuration clamps it
    /// to [1, 50] before construction.
    pub fn new(shard_count: usize) -> Self {
        let count = shard_count.max(1);
        Self {
            shards: (0..count).map(|_| Shard::new()).collect(),
            dirty: DirtySet::new(),
        }
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The dirty set shared with the snapshot engine.
    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    fn shard_for(&self, row_key: &str) -> &Shard {
        &self.shards[shard_index(row_key, self.shards.len())]
    }

    /// Append one value per qualifier to `row_key`/`family`.
    ///
    /// The caller has already validated the family against the registry.
    /// When `expires_at > 0` the written values carry the tombstone flag
    /// (TTL-write semantics) and the caller enqueues the matching reaper
    /// entry. Marks the row dirty after the shard lock is released.
    pub fn apply_write(
        &self,
        row_key: &str,
        family: &str,
        qualifiers: &[String],
        values: &[Vec<u8>],
        timestamp: i64,
        expires_at: i64,
    ) -> Result<()> {
        if qualifiers.is_empty() || qualifiers.len() != values.len() {
            return Err(Error::InvalidArgument(
                "qualifier/value count mismatch".to_string(),
            ));
        }

        {
            let mut data = self.shard_for(row_key).data.write();
            let row = data.entry(row_key.to_string()).or_default();
            let fam = row.entry(family.to_string()).or_default();
            for (qualifier, value) in qualifiers.iter().zip(values) {
                let cell = if expires_at > 0 {
                    TimestampedValue::expiring(value.clone(), timestamp, expires_at)
                } else {
                    TimestampedValue::new(value.clone(), timestamp)
                };
                let history = fam.entry(qualifier.clone()).or_default();
                history.push(cell);
                sort_history(history);
            }
        }

        self.dirty.mark(row_key, [family.to_string()]);
        Ok(())
    }

    /// Place tombstones on `row_key` and return the `(family, qualifier)`
    /// pairs that were tombstoned.
    ///
    /// Scope rules:
    /// - no family → every qualifier in every existing family,
    /// - family without qualifiers → every qualifier in that family,
    /// - family with qualifiers → each named qualifier; missing ones are
    ///   silently skipped.
    ///
    /// Marks the affected families dirty after the shard lock is released.
    pub fn apply_delete(
        &self,
        row_key: &str,
        family: Option<&str>,
        qualifiers: &[String],
        timestamp: i64,
        expires_at: i64,
    ) -> Result<Vec<(String, String)>> {
        let mut tombstoned: Vec<(String, String)> = Vec::new();

        {
            let mut data = self.shard_for(row_key).data.write();
            let row = data
                .get_mut(row_key)
                .ok_or_else(|| Error::NotFound(format!("row '{row_key}' does not exist")))?;

            match family {
                None => {
                    for (fam_name, fam) in row.iter_mut() {
                        for (qualifier, history) in fam.iter_mut() {
                            history.push(TimestampedValue::tombstone(timestamp, expires_at));
                            sort_history(history);
                            tombstoned.push((fam_name.clone(), qualifier.clone()));
                        }
                    }
                }
                Some(fam_name) => {
                    let fam = row.get_mut(fam_name).ok_or_else(|| {
                        Error::NotFound(format!(
                            "family '{fam_name}' not present on row '{row_key}'"
                        ))
                    })?;
                    if qualifiers.is_empty() {
                        for (qualifier, history) in fam.iter_mut() {
                            history.push(TimestampedValue::tombstone(timestamp, expires_at));
                            sort_history(history);
                            tombstoned.push((fam_name.to_string(), qualifier.clone()));
                        }
                    } else {
                        for qualifier in qualifiers {
                            if let Some(history) = fam.get_mut(qualifier) {
                                history.push(TimestampedValue::tombstone(timestamp, expires_at));
                                sort_history(history);
                                tombstoned.push((fam_name.to_string(), qualifier.clone()));
                            }
                        }
                    }
                }
            }
        }

        let families: HashSet<String> = tombstoned.iter().map(|(f, _)| f.clone()).collect();
        self.dirty.mark(row_key, families);
        Ok(tombstoned)
    }

    /// Clone out one family of one row, or `None` when either is absent.
    pub fn get_row_family(&self, row_key: &str, family: &str) -> Option<Family> {
        let data = self.shard_for(row_key).data.read();
        data.get(row_key).and_then(|row| row.get(family)).cloned()
    }

    /// Collect every row whose key starts with `prefix`.
    ///
    /// Fans out across all shards concurrently; each task holds only its
    /// own shard's read lock.
    pub fn filter_rows_prefix(&self, prefix: &str) -> Data {
        self.collect_matching(|key| key.starts_with(prefix))
    }

    /// Collect every row whose key matches `pattern`.
    ///
    /// An invalid pattern yields an empty result so the caller keeps its
    /// "no match" semantics.
    pub fn filter_rows_regex(&self, pattern: &str) -> Data {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!(pattern, error = %e, "invalid row scan pattern");
                return Data::new();
            }
        };
        self.collect_matching(|key| re.is_match(key))
    }

    fn collect_matching<F>(&self, matches: F) -> Data
    where
        F: Fn(&str) -> bool + Sync,
    {
        self.shards
            .par_iter()
            .map(|shard| {
                let data = shard.data.read();
                data.iter()
                    .filter(|(key, _)| matches(key))
                    .map(|(key, row)| (key.clone(), row.clone()))
                    .collect::<Data>()
            })
            .reduce(Data::new, |mut merged, part| {
                merged.extend(part);
                merged
            })
    }

    /// Physically remove reclaimable values from `row_key`/`family`.
    ///
    /// Drops every value with `timestamp <= threshold_ts` from the named
    /// qualifiers; when `qualifiers` is empty the whole family is dropped
    /// outright. Qualifiers, families, and rows left empty are removed
    /// within the same critical section. Returns true iff anything was
    /// removed.
    pub fn delete_expired_tombstones(
        &self,
        row_key: &str,
        family: &str,
        qualifiers: &[String],
        threshold_ts: i64,
    ) -> bool {
        let mut data = self.shard_for(row_key).data.write();
        let Some(row) = data.get_mut(row_key) else {
            return false;
        };

        let mut removed = false;
        if qualifiers.is_empty() {
            removed = row.remove(family).is_some();
        } else {
            let Some(fam) = row.get_mut(family) else {
                return false;
            };
            for qualifier in qualifiers {
                if let Some(history) = fam.get_mut(qualifier) {
                    let before = history.len();
                    history.retain(|v| v.timestamp > threshold_ts);
                    if history.len() != before {
                        removed = true;
                    }
                    if history.is_empty() {
                        fam.remove(qualifier);
                    }
                }
            }
            if fam.is_empty() {
                row.remove(family);
            }
        }

        if row.is_empty() {
            data.remove(row_key);
            debug!(row_key, "removed empty row after reclamation");
        }
        removed
    }

    /// Deep-copy the named families of one row for the snapshot engine.
    ///
    /// Values that are already-expired tombstones at `now` are skipped;
    /// qualifiers left with no values are omitted from the copy.
    pub fn snapshot_row(
        &self,
        row_key: &str,
        families: &HashSet<String>,
        now: i64,
    ) -> RowSnapshot {
        let data = self.shard_for(row_key).data.read();
        let Some(row) = data.get(row_key) else {
            return RowSnapshot::Missing;
        };

        let mut copied: HashMap<String, Option<Family>> = HashMap::new();
        for family in families {
            match row.get(family) {
                None => {
                    copied.insert(family.clone(), None);
                }
                Some(fam) => {
                    let mut fam_copy = Family::new();
                    for (qualifier, history) in fam {
                        let kept: Vec<TimestampedValue> = history
                            .iter()
                            .filter(|v| !v.is_expired(now))
                            .cloned()
                            .collect();
                        if !kept.is_empty() {
                            fam_copy.insert(qualifier.clone(), kept);
                        }
                    }
                    copied.insert(family.clone(), Some(fam_copy));
                }
            }
        }
        RowSnapshot::Present(copied)
    }

    /// Distribute recovered rows to their shards.
    ///
    /// Each shard is locked individually and its `initialized` flag set
    /// afterwards; a second load attempt is refused.
    pub fn load_rows(&self, data: Data) -> Result<()> {
        if self
            .shards
            .iter()
            .any(|s| s.initialized.load(Ordering::Acquire))
        {
            return Err(Error::Internal(
                "shard store is already initialized".to_string(),
            ));
        }

        let mut per_shard: Vec<Vec<(String, Row)>> =
            (0..self.shards.len()).map(|_| Vec::new()).collect();
        for (row_key, row) in data {
            per_shard[shard_index(&row_key, self.shards.len())].push((row_key, row));
        }

        for (shard, rows) in self.shards.iter().zip(per_shard) {
            {
                let mut data = shard.data.write();
                data.extend(rows);
            }
            shard.initialized.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Total number of rows across all shards.
    pub fn row_count(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    /// Row counts per shard, in shard order.
    pub fn rows_per_shard(&self) -> Vec<usize> {
        self.shards.iter().map(Shard::len).collect()
    }
}

impl std::fmt::Debug for ShardedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStore")
            .field("shard_count", &self.shard_count())
            .field("row_count", &self.row_count())
            .finish()
    }
}
