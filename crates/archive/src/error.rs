//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The naming pattern or date format failed to compile or render.
    #[display("issue with file naming template")]
    Template,
    /// A generated entry name was empty or escaped the archive root.
    #[display("invalid entry name: {_0}")]
    InvalidName(#[error(not(source))] String),
    /// No successful results to put in the archive.
    #[display("nothing to archive")]
    Empty,
    /// Writing the zip container failed.
    #[display("failed to write archive")]
    Write,
    /// The requested compression method is not supported.
    #[display("unsupported compression: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The requested compression method is supported but not enabled.
    #[display("disabled compression: {_0}")]
    DisabledFormat(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Archives are built in memory from inputs we already hold; nothing
        // here depends on transient state.
        false
    }
}
