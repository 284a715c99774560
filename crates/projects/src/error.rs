//! Project Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use resizesuite_tiers::Rejection;
use std::path::PathBuf;

/// A project store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for project operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No project with this ID
    #[display("project not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The plan does not include projects
    #[display("{_0}")]
    Rejected(#[error(not(source))] Rejection),
    /// Saving would exceed the plan's saved-project allowance
    #[display("Project limit reached. Maximum is {_0} saved projects")]
    LimitReached(#[error(not(source))] usize),
    /// Reading or writing the store file failed
    #[display("I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The store file exists but isn't a JSON array of projects
    #[display("corrupt project store: {}", _0.display())]
    Corrupt(#[error(not(source))] PathBuf),
    /// A project could not be serialized
    #[display("failed to serialize projects")]
    Serialize,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
