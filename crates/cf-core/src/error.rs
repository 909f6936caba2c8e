//! Error types for cutflow

use thiserror::Error;

/// Cutflow error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expression or configuration syntax error, carrying the originating
    /// config line for diagnostics
    #[error("syntax error in line {line}: {message}")]
    Syntax {
        /// What is wrong, including the offending expression text.
        message: String,
        /// Config line the expression came from.
        line: usize,
    },

    /// Validation error
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Shorthand for a [`Error::Syntax`] with a line number.
    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        Error::Syntax { message: message.into(), line }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
