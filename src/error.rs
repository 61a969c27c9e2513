//! Error types for datawalk.
//!
//! Every error is fatal to the document being run: nothing here is retried
//! and no partial result is returned alongside an error.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for datawalk operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Source file missing, unreadable, malformed, or a row offset out of range.
    #[error("failed to read {path}: {reason}")]
    SourceRead { path: PathBuf, reason: String },

    /// Two sequences that must align positionally differ in length.
    #[error("length mismatch in {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Remote retrieval failed (network failure or non-2xx response).
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// No label pattern matched the input.
    #[error("no pattern matches {input:?}")]
    NoMatch { input: String },

    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    #[error("index {index} out of range for dimension {dimension:?} of length {len}")]
    IndexOutOfRange {
        dimension: String,
        index: usize,
        len: usize,
    },

    #[error("column {column:?} holds non-numeric value {value:?}")]
    NotNumeric { column: String, value: String },

    /// A header label appears at two positions.
    #[error("duplicate column label {label:?} at positions {first} and {second}")]
    DuplicateLabel {
        label: String,
        first: usize,
        second: usize,
    },

    #[error("invalid recipe: {0}")]
    Recipe(String),
}

impl Error {
    pub fn source_read(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::SourceRead {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn length_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
