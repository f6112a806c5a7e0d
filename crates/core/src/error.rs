//! Error types for the Celltable storage core
//!
//! One unified error enum is used across every crate. We use `thiserror`
//! for the `Display` and `Error` implementations.
//!
//! Foreground callers receive one of the user-visible statuses from
//! [`Error::status`]; background loops log transient I/O errors and retry
//! on the next tick instead of surfacing them.

use std::io;
use thiserror::Error;

/// Result type alias for Celltable operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the Celltable storage core.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed query, unknown parameter, count mismatch, bad timestamp.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Row or family not present for the operation's contract.
    #[error("not found: {0}")]
    NotFound(String),

    /// Column family not present in the registry allow-list.
    #[error("unknown column family: {0}")]
    FamilyUnknown(String),

    /// Column family already registered.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Persisted state failed to parse; startup must not proceed.
    #[error("data corruption: {0}")]
    Corruption(String),

    /// Invariant violation or unclassified internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// The user-visible status for this error kind.
    ///
    /// Messages carried alongside the status never leak file paths or
    /// internal identifiers; those go to the logs only.
    pub fn status(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "INVALID",
            Error::NotFound(_) => "NOT_FOUND",
            Error::FamilyUnknown(_) => "FAMILY_UNKNOWN",
            Error::AlreadyExists(_) => "ALREADY_EXISTS",
            Error::Io(_) | Error::Serialization(_) | Error::Corruption(_) | Error::Internal(_) => {
                "UNAVAILABLE"
            }
        }
    }

    /// Check whether this error is a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check whether this error is a validation failure.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}
