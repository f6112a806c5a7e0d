//! Nanosecond wall-clock helpers
//!
//! Every timestamp in the system is an `i64` count of nanoseconds since the
//! Unix epoch, in memory and on disk.

use chrono::Utc;

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_nanos() -> i64 {
    // Representable until the year 2262; saturate rather than panic beyond.
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Convert a TTL in whole seconds to nanoseconds.
pub fn secs_to_nanos(secs: i64) -> i64 {
    secs.saturating_mul(1_000_000_000)
}
