//! Error types for the results-database reader.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for results-database operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The leading file tag is missing or malformed
    #[error("Invalid results file tag: {0}")]
    InvalidTag(String),

    /// The text header could not be parsed
    #[error("Invalid results file header: {0}")]
    InvalidHeader(String),

    /// File is truncated or corrupted
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// No read operation is registered for this (class, bit width) pair
    #[error("No read operation for data class {class:?} with {size} bit values")]
    UnknownReadOp { class: String, size: u32 },

    /// The entry handle does not refer to a variable reference
    #[error("Entry is not a variable reference: {0}")]
    NotAVariable(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create an invalid header error.
    pub fn header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }
}

/// Result type alias for results-database operations.
pub type Result<T> = std::result::Result<T, Error>;
