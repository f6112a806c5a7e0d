//! Data model for wide-column cells
//!
//! A cell is addressed by row key → column family → column qualifier and
//! holds an ordered history of [`TimestampedValue`]s, newest first. The map
//! aliases below are the in-memory representation; the same shapes serialize
//! to the on-disk JSON formats (snapshots, backups).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered history of one qualifier, sorted descending by timestamp.
pub type QualifierHistory = Vec<TimestampedValue>;

/// Column family contents: qualifier name → history.
pub type Family = HashMap<String, QualifierHistory>;

/// One row: family name → family contents.
pub type Row = HashMap<String, Family>;

/// The full data plane: row key → row.
pub type Data = HashMap<String, Row>;

/// One cell version.
///
/// `value` is an opaque byte string, base64-encoded in JSON. A tombstone
/// masks every older value of its qualifier until physically reclaimed;
/// `expires_at` (nanoseconds, 0 = never) is the earliest time at which the
/// reaper may reclaim it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampedValue {
    /// Opaque byte payload (empty for tombstones).
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    /// Write timestamp, nanoseconds since epoch.
    pub timestamp: i64,
    /// Deletion sentinel flag.
    #[serde(
        rename = "tombstone",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_tombstone: bool,
    /// Earliest reclamation time in nanoseconds; 0 means no expiry.
    #[serde(rename = "expiresAt", default, skip_serializing_if = "is_zero")]
    pub expires_at: i64,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

impl TimestampedValue {
    /// Create a live value written at `timestamp`.
    pub fn new(value: Vec<u8>, timestamp: i64) -> Self {
        Self {
            value,
            timestamp,
            is_tombstone: false,
            expires_at: 0,
        }
    }

    /// Create a value that expires: the tombstone flag is set so the record
    /// is invisible to reads and reclaimable once `expires_at` passes.
    pub fn expiring(value: Vec<u8>, timestamp: i64, expires_at: i64) -> Self {
        Self {
            value,
            timestamp,
            is_tombstone: true,
            expires_at,
        }
    }

    /// Create a deletion tombstone placed at `timestamp`.
    pub fn tombstone(timestamp: i64, expires_at: i64) -> Self {
        Self {
            value: Vec::new(),
            timestamp,
            is_tombstone: true,
            expires_at,
        }
    }

    /// True when this is a tombstone whose reclamation time has passed.
    pub fn is_expired(&self, now: i64) -> bool {
        self.is_tombstone && self.expires_at > 0 && now > self.expires_at
    }
}

/// Re-establish descending timestamp order after an insertion.
///
/// The sort is stable, so values sharing a timestamp keep their insertion
/// order and the last-written one stays closest to the tail of its group.
pub fn sort_history(history: &mut QualifierHistory) {
    history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Apply the read-path tombstone filter to a history.
///
/// Works on a descending-sorted history: locates the newest tombstone's
/// timestamp `t*` (if any), keeps only live values strictly newer than
/// `t*`, and truncates to `latest` entries when `latest > 0`.
pub fn filter_live(history: &[TimestampedValue], latest: usize) -> QualifierHistory {
    let newest_tombstone = history
        .iter()
        .filter(|v| v.is_tombstone)
        .map(|v| v.timestamp)
        .max();

    let mut live: QualifierHistory = history
        .iter()
        .filter(|v| !v.is_tombstone)
        .filter(|v| newest_tombstone.map_or(true, |t| v.timestamp > t))
        .cloned()
        .collect();

    if latest > 0 {
        live.truncate(latest);
    }
    live
}
