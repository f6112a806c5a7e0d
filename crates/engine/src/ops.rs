//! Operations layer
//!
//! Translates parsed queries into shard operations. Every mutation is
//! gated by the write-ahead log: the WAL append happens first, and a
//! failed append aborts the mutation before any in-memory change. After a
//! successful shard application the operation enqueues reaper work (for
//! tombstones and TTL'd writes) and emits CDC events, both best-effort.
//!
//! READ never touches the WAL; neither do rejected queries.

use celltable_core::time::secs_to_nanos;
use celltable_core::{filter_live, now_nanos, Error, Family, Result, Row, TimestampedValue};
use celltable_durability::{ReaperEntry, ReaperLog, Wal, WalEntry, WalOperation};
use celltable_storage::{FamilyRegistry, ShardedStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cdc::{CdcEvent, CdcOperation, CdcSink};
use crate::query::{Query, QueryOperation};

/// Result of a successful operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// The operation completed with nothing to return.
    Ack,
    /// A single row view: family → qualifier → values.
    Row(Row),
    /// A scan result keyed by row key.
    Rows(HashMap<String, Row>),
}

/// The operations layer: validation, WAL gating, shard application, CDC.
pub struct Operations {
    store: Arc<ShardedStore>,
    registry: Arc<FamilyRegistry>,
    wal: Arc<Wal>,
    reaper_log: Arc<ReaperLog>,
    sink: Arc<dyn CdcSink>,
    default_tombstone_ttl_s: i64,
}

impl Operations {
    /// Assemble the operations layer over its collaborators.
    pub fn new(
        store: Arc<ShardedStore>,
        registry: Arc<FamilyRegistry>,
        wal: Arc<Wal>,
        reaper_log: Arc<ReaperLog>,
        sink: Arc<dyn CdcSink>,
        default_tombstone_ttl_s: i64,
    ) -> Self {
        Self {
            store,
            registry,
            wal,
            reaper_log,
            sink,
            default_tombstone_ttl_s,
        }
    }

    /// Parse and dispatch one query.
    pub fn execute(&self, raw: &str) -> Result<Output> {
        let query = Query::parse(raw)?;
        match query.operation {
            QueryOperation::Create => self.create(&query),
            QueryOperation::Write => self.write(&query),
            QueryOperation::Read => self.read(&query),
            QueryOperation::Delete => self.delete(&query),
        }
    }

    /// WRITE: append one value per qualifier to a row/family.
    pub fn write(&self, query: &Query) -> Result<Output> {
        let row_key = required(query.row_key.as_deref(), "key")?;
        let family = required(query.single_family()?, "family")?;
        if query.qualifiers.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one qualifier/value pair is required".to_string(),
            ));
        }
        if query.qualifiers.len() != query.values.len() {
            return Err(Error::InvalidArgument(format!(
                "{} qualifiers but {} values",
                query.qualifiers.len(),
                query.values.len()
            )));
        }
        if !self.registry.is_allowed(family) {
            return Err(Error::FamilyUnknown(family.to_string()));
        }

        let timestamp = query.timestamp.unwrap_or_else(now_nanos);
        let expires_at = match query.ttl {
            Some(ttl) if ttl > 0 => timestamp.saturating_add(secs_to_nanos(ttl)),
            _ => 0,
        };

        self.wal
            .append(&WalEntry::new(WalOperation::Write, &*query.raw, now_nanos()))?;

        self.store.apply_write(
            row_key,
            family,
            &query.qualifiers,
            &query.values,
            timestamp,
            expires_at,
        )?;

        if expires_at > 0 {
            self.enqueue_reaper(row_key, family, query.qualifiers.clone(), timestamp, expires_at);
        }

        let mut written = Family::new();
        for (qualifier, value) in query.qualifiers.iter().zip(&query.values) {
            let cell = if expires_at > 0 {
                TimestampedValue::expiring(value.clone(), timestamp, expires_at)
            } else {
                TimestampedValue::new(value.clone(), timestamp)
            };
            self.sink.emit(CdcEvent {
                operation: CdcOperation::Write,
                row_key: row_key.to_string(),
                family: family.to_string(),
                qualifier: qualifier.clone(),
                value: cell.clone(),
            });
            written.insert(qualifier.clone(), vec![cell]);
        }
        debug!(row_key, family, cells = query.qualifiers.len(), "write applied");

        let mut row = Row::new();
        row.insert(family.to_string(), written);
        Ok(Output::Row(row))
    }

    /// READ: point lookup or prefix/regex scan with the tombstone filter.
    pub fn read(&self, query: &Query) -> Result<Output> {
        let family = required(query.single_family()?, "family")?;
        if !self.registry.is_allowed(family) {
            return Err(Error::FamilyUnknown(family.to_string()));
        }

        let selectors = [
            query.row_key.as_deref(),
            query.prefix.as_deref(),
            query.regex.as_deref(),
        ];
        if selectors.iter().flatten().count() != 1 {
            return Err(Error::InvalidArgument(
                "exactly one of key, prefix, or regex is required".to_string(),
            ));
        }

        if let Some(row_key) = query.row_key.as_deref() {
            let fam = self
                .store
                .get_row_family(row_key, family)
                .ok_or_else(|| Error::NotFound(format!("row '{row_key}' not found")))?;
            let mut row = Row::new();
            row.insert(
                family.to_string(),
                project_family(&fam, &query.qualifiers, query.latest),
            );
            return Ok(Output::Row(row));
        }

        let matched = if let Some(prefix) = query.prefix.as_deref() {
            self.store.filter_rows_prefix(prefix)
        } else {
            // Selector count above guarantees regex is present here
            self.store
                .filter_rows_regex(query.regex.as_deref().unwrap_or_default())
        };

        let mut result: HashMap<String, Row> = HashMap::new();
        for (row_key, row) in matched {
            if let Some(fam) = row.get(family) {
                let mut view = Row::new();
                view.insert(
                    family.to_string(),
                    project_family(fam, &query.qualifiers, query.latest),
                );
                result.insert(row_key, view);
            }
        }

        if result.is_empty() {
            return Err(Error::NotFound("no rows matched".to_string()));
        }
        Ok(Output::Rows(result))
    }

    /// DELETE: place tombstones and reserve their future reclamation.
    pub fn delete(&self, query: &Query) -> Result<Output> {
        let row_key = required(query.row_key.as_deref(), "key")?;
        let family = query.single_family()?;
        if family.is_none() && !query.qualifiers.is_empty() {
            return Err(Error::InvalidArgument(
                "qualifiers require a family".to_string(),
            ));
        }

        // Supplied timestamps are bumped so the tombstone outranks a value
        // written at the same instant.
        let timestamp = match query.timestamp {
            Some(ts) => ts.saturating_add(1),
            None => now_nanos(),
        };
        let ttl = query.ttl.unwrap_or(self.default_tombstone_ttl_s);
        let expires_at = timestamp.saturating_add(secs_to_nanos(ttl));

        self.wal
            .append(&WalEntry::new(WalOperation::Delete, &*query.raw, now_nanos()))?;

        let tombstoned =
            self.store
                .apply_delete(row_key, family, &query.qualifiers, timestamp, expires_at)?;

        let mut per_family: HashMap<String, Vec<String>> = HashMap::new();
        for (fam, qualifier) in &tombstoned {
            per_family
                .entry(fam.clone())
                .or_default()
                .push(qualifier.clone());
        }
        for (fam, qualifiers) in per_family {
            self.enqueue_reaper(row_key, &fam, qualifiers, timestamp, expires_at);
        }

        for (fam, qualifier) in &tombstoned {
            self.sink.emit(CdcEvent {
                operation: CdcOperation::Delete,
                row_key: row_key.to_string(),
                family: fam.clone(),
                qualifier: qualifier.clone(),
                value: TimestampedValue::tombstone(timestamp, expires_at),
            });
        }
        debug!(row_key, tombstones = tombstoned.len(), "delete applied");
        Ok(Output::Ack)
    }

    /// CREATE: register new column families.
    pub fn create(&self, query: &Query) -> Result<Output> {
        if query.families.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one family name is required".to_string(),
            ));
        }
        for name in &query.families {
            if self.registry.is_allowed(name.trim()) {
                return Err(Error::AlreadyExists(format!(
                    "family '{}' is already registered",
                    name.trim()
                )));
            }
        }

        self.wal.append(&WalEntry::new(
            WalOperation::CreateFamily,
            &*query.raw,
            now_nanos(),
        ))?;

        self.registry.update_families(&query.families)?;
        Ok(Output::Ack)
    }

    // A lost reservation is recoverable (a later delete re-enqueues), so
    // an enqueue failure must not fail the already-applied mutation.
    fn enqueue_reaper(
        &self,
        row_key: &str,
        family: &str,
        qualifiers: Vec<String>,
        timestamp: i64,
        expires_at: i64,
    ) {
        let entry = ReaperEntry {
            row_key: row_key.to_string(),
            family: family.to_string(),
            qualifiers,
            timestamp,
            expires_at,
        };
        if let Err(e) = self.reaper_log.append(&entry) {
            warn!(row_key, family, error = %e, "failed to enqueue reaper entry");
        }
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::InvalidArgument(format!("{name} is required"))),
    }
}

/// Project one family through the qualifier restriction, the tombstone
/// filter, and the `latest` cap. Qualifiers with no live values are
/// omitted entirely.
fn project_family(fam: &Family, qualifiers: &[String], latest: usize) -> Family {
    let mut view = Family::new();
    if qualifiers.is_empty() {
        for (qualifier, history) in fam {
            let live = filter_live(history, latest);
            if !live.is_empty() {
                view.insert(qualifier.clone(), live);
            }
        }
    } else {
        for qualifier in qualifiers {
            if let Some(history) = fam.get(qualifier) {
                let live = filter_live(history, latest);
                if !live.is_empty() {
                    view.insert(qualifier.clone(), live);
                }
            }
        }
    }
    view
}
