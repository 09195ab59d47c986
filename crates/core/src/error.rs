//! Error types for geokrige

use thiserror::Error;

/// Main error type for geokrige operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Not enough observations (or non-empty lag bins) to proceed.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// No candidate variogram family produced a usable fit.
    #[error("Variogram fitting failed: {0}")]
    FittingFailure(String),

    /// The covariance system is singular or close to it, typically because
    /// two observations share a location.
    #[error("Degenerate input: {reason}")]
    DegenerateInput { reason: String },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::DegenerateInput`].
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Error::DegenerateInput {
            reason: reason.into(),
        }
    }
}

/// Result type alias for geokrige operations
pub type Result<T> = std::result::Result<T, Error>;
