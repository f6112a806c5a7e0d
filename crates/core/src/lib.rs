//! Core types for the Celltable storage engine
//!
//! This crate defines the data model shared by every layer:
//! - `TimestampedValue`: one cell version (value, timestamp, tombstone, expiry)
//! - Row/family/qualifier map aliases and their JSON encoding
//! - The unified error type and status taxonomy
//! - Nanosecond wall-clock helpers
//!
//! Everything here is pure data: no locks, no I/O. The storage, durability,
//! and engine crates build on these types.

#![warn(missing_docs)]

pub mod error;
pub mod time;
pub mod types;

pub use error::{Error, Result};
pub use time::now_nanos;
pub use types::{
    filter_live, sort_history, Data, Family, QualifierHistory, Row, TimestampedValue,
};
