//! Imaging Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An imaging error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for imaging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input bytes could not be decoded as an image. Don't retry with the
    /// same input.
    #[display("invalid or corrupted image data")]
    Decode,
    /// The processed image could not be encoded into the output format.
    #[display("failed to encode {_0}")]
    Encode(#[error(not(source))] &'static str),
    /// The input format is recognised but cannot be processed.
    #[display("unsupported format: {_0}")]
    Unsupported(#[error(not(source))] String),
    /// An operation parameter is out of range or contradictory.
    #[display("invalid parameter: {_0}")]
    InvalidParameter(#[error(not(source))] String),
    /// A raster surface could not be allocated.
    #[display("failed to allocate {_0}x{_1} surface")]
    Allocation(#[error(not(source))] u32, #[error(not(source))] u32),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Allocation can fail under transient memory pressure; everything
        // else is a property of the input and will fail the same way again.
        matches!(self, Self::Allocation(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Decode.to_string(), "invalid or corrupted image data");
        assert_eq!(ErrorKind::Encode("jpeg").to_string(), "failed to encode jpeg");
        assert_eq!(ErrorKind::Allocation(3, 4).to_string(), "failed to allocate 3x4 surface");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::Decode.is_retryable());
        assert!(!ErrorKind::InvalidParameter("x".to_string()).is_retryable());
        assert!(ErrorKind::Allocation(1, 1).is_retryable());
    }
}
