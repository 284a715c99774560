//! Batch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use resizesuite_tiers::Rejection;
use std::path::PathBuf;

/// A batch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for batch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies why a batch (or a single file within it) failed.
///
/// ### Batch Errors
/// - [`ErrorKind::Rejected`] - the batch never started.
/// - [`ErrorKind::Read`]
///
/// ### Per-File Errors
/// These end up as the `error` message on a failed
/// [`FileResult`](crate::FileResult) rather than escaping the batch.
/// - [`ErrorKind::Processing`]
/// - [`ErrorKind::Panicked`]
/// - [`ErrorKind::Worker`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The batch failed validation or the plan lacks the operation's
    /// capability. Nothing was processed.
    #[display("{_0}")]
    Rejected(#[error(not(source))] Rejection),
    /// An input file could not be read from disk.
    #[display("failed to read {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// The processor returned an error for this file.
    #[display("{message}")]
    Processing { message: String, retryable: bool },
    /// The processor panicked.
    #[display("processing panicked")]
    Panicked,
    /// The blocking worker was torn down before finishing.
    #[display("worker stopped before finishing")]
    Worker,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Processing { retryable, .. } => *retryable,
            Self::Worker => true,
            Self::Rejected(_) | Self::Read(_) | Self::Panicked => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        let rejection = Rejection::TooManyFiles { count: 6, limit: 5 };
        assert_eq!(ErrorKind::Rejected(rejection).to_string(), "Too many files. Maximum is 5 images per batch");
        assert_eq!(ErrorKind::Read(PathBuf::from("a/b.png")).to_string(), "failed to read a/b.png");
        let processing = ErrorKind::Processing { message: "invalid or corrupted image data".into(), retryable: false };
        assert_eq!(processing.to_string(), "invalid or corrupted image data");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::Panicked.is_retryable());
        assert!(ErrorKind::Worker.is_retryable());
        assert!(ErrorKind::Processing { message: String::new(), retryable: true }.is_retryable());
        assert!(!ErrorKind::Processing { message: String::new(), retryable: false }.is_retryable());
    }
}
