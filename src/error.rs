//! Error types shared by the ledger, persistence and profile layers.
//!
//! None of these are fatal. Every failure leaves in-memory state untouched
//! and is reported to the caller as a value.

use std::path::PathBuf;
use thiserror::Error;

/// Input rejected before a ledger mutation is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be a whole number >= 0, got {value:?}")]
    NotACount { field: &'static str, value: String },

    #[error("weight must be a non-negative number, got {0:?}")]
    InvalidWeight(String),

    #[error("date must use dd/mm/yyyy, got {0:?}")]
    InvalidDate(String),

    #[error("row {index} is out of range for a ledger of {len} rows")]
    RowOutOfRange { index: usize, len: usize },

    #[error("{0:?} is not a valid name")]
    InvalidName(String),

    #[error("{file} would collide with the ledgers of profile {owner:?}")]
    NameClash { file: String, owner: String },
}

/// Failure reading or writing a file in the data directory.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Parse {
            path: path.into(),
            source,
        }
    }

    /// `true` for corrupt file contents as opposed to an I/O failure.
    pub fn is_parse(&self) -> bool {
        matches!(self, StoreError::Parse { .. })
    }
}

/// Precondition violations and storage failures of profile operations.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("a profile named {0:?} already exists")]
    DuplicateProfile(String),

    #[error("profile {0:?} is active and cannot be deleted")]
    CannotDeleteActiveProfile(String),

    #[error("no profile named {0:?}")]
    UnknownProfile(String),

    #[error("{0:?} is not a valid profile name")]
    InvalidName(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
