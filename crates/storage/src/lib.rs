//! In-memory storage layer for Celltable
//!
//! This crate implements the sharded data plane:
//! - `ShardedStore`: N independently locked shards of rows, addressed by
//!   FNV-1a of the row key (stable across restarts)
//! - `FamilyRegistry`: the persisted allow-list of column families
//! - `DirtySet`: rows mutated since the last incremental snapshot
//!
//! Every value handed out of a shard is a structural clone; interior
//! mutation happens only inside a shard's locked scope.

#![warn(missing_docs)]

pub mod dirty;
pub mod fnv;
pub mod registry;
pub mod sharded;

pub use dirty::DirtySet;
pub use fnv::fnv1a_32;
pub use registry::FamilyRegistry;
pub use sharded::{RowSnapshot, Shard, ShardedStore};
