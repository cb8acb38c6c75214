//! Error types for stackplot

use thiserror::Error;

/// stackplot error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error. Fatal: aborts the whole run.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A requested histogram object could not be found. Fatal to the
    /// current plot only; the driver skips it and continues.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Numeric degeneracy or computation failure
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error must abort the whole run rather than just the
    /// plot currently being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}
