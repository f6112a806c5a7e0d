//! On-disk layout under the data root
//!
//! ```text
//! <root>/.wal/wal.log              write-ahead log
//! <root>/.reaper.gc.log            reaper queue
//! <root>/.snapshots/ss-incr-*.db   incremental snapshots
//! <root>/.table_backup/backup-*.db full backups
//! <root>/families.config.json      family registry
//! ```

use std::path::{Path, PathBuf};

/// Directory holding the write-ahead log.
pub fn wal_dir(root: &Path) -> PathBuf {
    root.join(".wal")
}

/// The write-ahead log file.
pub fn wal_file(root: &Path) -> PathBuf {
    wal_dir(root).join("wal.log")
}

/// The reaper queue file.
pub fn reaper_log_file(root: &Path) -> PathBuf {
    root.join(".reaper.gc.log")
}

/// Directory holding incremental snapshot files.
pub fn snapshots_dir(root: &Path) -> PathBuf {
    root.join(".snapshots")
}

/// Directory holding full backup files.
pub fn backups_dir(root: &Path) -> PathBuf {
    root.join(".table_backup")
}

/// The family registry file.
pub fn families_file(root: &Path) -> PathBuf {
    root.join("families.config.json")
}

/// Zero-pad a nanosecond timestamp so lexicographic file order is
/// chronological order.
pub fn padded_nanos(nanos: i64) -> String {
    format!("{:019}", nanos.max(0))
}
