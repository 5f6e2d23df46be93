//! Error types for delta operations.

use thiserror::Error;

/// Result type for delta operations.
pub type Result<T> = std::result::Result<T, DeltaError>;

/// Errors that can occur while diffing, patching or indexing.
#[derive(Error, Debug)]
pub enum DeltaError {
    /// I/O error from an underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The patch container is malformed or lies about its contents.
    #[error("corrupt patch: {0}")]
    CorruptPatch(String),

    /// The persisted suffix index is malformed.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// A caller-supplied argument is not usable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
