//! Tier Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A tier error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for tier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The plan name is not one of the known tiers.
    #[display("unknown plan: {_0}")]
    UnknownPlan(#[error(not(source))] String),
    /// The capability name is not a known feature flag.
    #[display("unknown capability: {_0}")]
    UnknownCapability(#[error(not(source))] String),
    /// The subscription status reported by billing is not recognised.
    #[display("unknown subscription status: {_0}")]
    UnknownStatus(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Parsing a name either works or it doesn't.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::UnknownPlan("gold".to_string()).to_string(), "unknown plan: gold");
        assert_eq!(
            ErrorKind::UnknownStatus("paused".to_string()).to_string(),
            "unknown subscription status: paused"
        );
    }
}
