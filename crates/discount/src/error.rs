//! Discount subsystem error types.

use std::time::Duration;

use thiserror::Error;

/// Failures reported by a rule repository.
#[derive(Debug, Error)]
pub enum RuleRepositoryError {
    /// The backing source could not be reached.
    #[error("Rule source unavailable: {0}")]
    Unavailable(String),

    /// The fetch did not finish within the configured bound.
    #[error("Rule fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// A holiday season specification that could not be parsed.
#[derive(Debug, Error)]
#[error("Invalid holiday season {value:?}: expected MM-DD..MM-DD")]
pub struct InvalidHolidaySeason {
    pub value: String,
}
