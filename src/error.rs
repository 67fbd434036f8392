//! Error types for the keydir library.
//!
//! Lookups that find nothing are not errors: they return `Ok(None)` or an
//! empty list. Everything in this module is a failure the caller has to
//! handle or surface.

use thiserror::Error;

/// The main error type for keydir operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Key material failed structural checks
    #[error("Key material parsing failed: {0}")]
    Parse(String),

    /// Invalid input provided (malformed email, empty identifier, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored data contradicts an invariant of the directory
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error from anyhow
    #[error("Error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// A specialized Result type for keydir operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error was caused by the caller's input rather than by
    /// storage or an internal inconsistency.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Error::Parse(_) | Error::InvalidInput(_))
    }
}
