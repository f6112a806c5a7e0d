//! Dirty-row bookkeeping for the snapshot engine
//!
//! Records which rows (and which families within them) were mutated since
//! the last incremental snapshot. The snapshot engine drains the set on
//! each flush; a failed flush leaves the set drained and the next mutation
//! re-dirties the row.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Process-local map of row key → families mutated since the last flush.
#[derive(Debug, Default)]
pub struct DirtySet {
    inner: Mutex<HashMap<String, HashSet<String>>>,
}

impl DirtySet {
    /// Create an empty dirty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `families` of `row_key` as mutated.
    pub fn mark<I>(&self, row_key: &str, families: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut inner = self.inner.lock();
        let entry = inner.entry(row_key.to_string()).or_default();
        for family in families {
            entry.insert(family.into());
        }
    }

    /// Take the full contents, leaving the set empty.
    pub fn drain(&self) -> HashMap<String, HashSet<String>> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// True when no row is dirty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Number of dirty rows.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
