//! Error types for gridcalc-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gridcalc-core
#[derive(Debug, Error)]
pub enum Error {
    /// Text is not a valid A1-style cell or range reference
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Text or components do not form a calendar date
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// JSON payload could not be read or written
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    pub(crate) fn reference(text: &str, reason: &str) -> Self {
        Error::InvalidReference(format!("{} in '{}'", reason, text))
    }
}
