//! Error types for nabor.

use thiserror::Error;

/// Errors surfaced by index construction, mutation, search, and snapshots.
#[derive(Debug, Error)]
pub enum Error {
    /// The index configuration is invalid or internally inconsistent.
    #[error("invalid index configuration: {0}")]
    Config(String),

    /// The operation is not applicable to the index's current state.
    #[error("invalid operation: {0}")]
    Usage(String),

    /// A file could not be opened, or a read/write came up short.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot failed validation while loading.
    #[error("snapshot format error: {0}")]
    Format(String),

    /// An in-memory invariant was violated. Always a bug, never an expected
    /// outcome of valid input.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Result type alias for nabor operations.
pub type Result<T> = std::result::Result<T, Error>;
