//! Error types for the voxpart toolkit
//!
//! Argument problems are reported before any file is touched; I/O and codec
//! failures are fatal to a run. Graph consistency findings are not errors at
//! all, they are reported by the verification pass as warnings.

use thiserror::Error;

/// Main error type for voxpart operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed CLI or API input (part counts, weights, tolerances, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Volume could not be decoded or encoded
    #[error("Image error: {0}")]
    Image(String),

    /// Hint file could not be parsed
    #[error("Hint file error at line {line}: {message}")]
    HintFile { line: usize, message: String },

    /// The partitioner rejected a request
    #[error("Partitioning failed: {0}")]
    Partition(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// True for errors raised while checking arguments, before any I/O
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Error::InvalidArgument(_) | Error::HintFile { .. })
    }
}

/// Convenience result type for voxpart operations
pub type Result<T> = std::result::Result<T, Error>;
