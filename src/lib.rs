//! # Celltable
//!
//! A wide-column, versioned, in-memory key-value store with on-disk
//! durability. Cells are addressed by row key → column family → column
//! qualifier; each cell keeps an ordered history of timestamped byte
//! values. Mutations are gated by a write-ahead log, deletions are
//! tombstones reclaimed by a background reaper, and persistence is
//! eventually consistent through incremental snapshots merged into a
//! bounded set of full backups.
//!
//! # Quick Start
//!
//! ```no_run
//! use celltable::{Database, Output};
//!
//! fn main() -> celltable::Result<()> {
//!     let db = Database::open("./my-data")?;
//!
//!     db.execute("create family=profile")?;
//!     db.execute("write key=user:1 family=profile qualifier=name value=ada")?;
//!
//!     if let Output::Row(row) = db.execute("read key=user:1 family=profile")? {
//!         assert_eq!(row["profile"]["name"][0].value, b"ada");
//!     }
//!
//!     db.execute("delete key=user:1 family=profile qualifier=name ttl=3600")?;
//!     Ok(())
//! }
//! ```
//!
//! # Query grammar
//!
//! Queries are whitespace-separated `key=value` tokens after an operation
//! word (`create`, `write`, `read`, `delete`); values are percent-decoded.
//! `qualifier=` and `value=` repeat positionally for multi-cell writes.
//!
//! # Architecture
//!
//! [`Database`] is the entry point. The internal crates (core, storage,
//! durability, engine) are re-exported here only through the types needed
//! to drive and observe the store.

pub use celltable_core::{
    filter_live, now_nanos, sort_history, Data, Error, Family, QualifierHistory, Result, Row,
    TimestampedValue,
};
pub use celltable_engine::{
    CdcEvent, CdcOperation, CdcSink, ChannelSink, Database, NullSink, Output, ShutdownReport,
    StoreConfig, StoreStats, CONFIG_FILE_NAME,
};

pub mod prelude;
