//! Engine layer for Celltable
//!
//! Ties the storage and durability layers together:
//! - `query`: the `key=value` text grammar for operations
//! - `ops`: WRITE / READ / DELETE / CREATE against the shard store,
//!   gated by the write-ahead log, with CDC emission
//! - `cdc`: the change-data-capture sink seam
//! - `reaper`: the background sweep reclaiming expired tombstones
//! - `snapshotter`: incremental snapshot flush, merge, prune, recovery
//! - `worker`: interval workers with cooperative shutdown
//! - `database`: the assembled `Database` facade
//! - `config`: `celltable.toml` configuration

#![warn(missing_docs)]

pub mod cdc;
pub mod config;
pub mod database;
pub mod ops;
pub mod query;
pub mod reaper;
pub mod snapshotter;
pub mod worker;

pub use cdc::{CdcEvent, CdcOperation, CdcSink, ChannelSink, NullSink};
pub use config::{StoreConfig, CONFIG_FILE_NAME};
pub use database::{Database, ShutdownReport, StoreStats};
pub use ops::{Operations, Output};
pub use query::{Query, QueryOperation};
