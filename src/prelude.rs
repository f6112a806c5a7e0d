//! Convenience imports for typical usage.
//!
//! ```no_run
//! use celltable::prelude::*;
//!
//! # fn main() -> celltable::Result<()> {
//! let db = Database::open("./data")?;
//! db.execute("create family=profile")?;
//! # Ok(())
//! # }
//! ```

pub use crate::{
    CdcEvent, CdcOperation, CdcSink, Database, Error, Output, Result, StoreConfig,
    TimestampedValue,
};
