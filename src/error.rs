use std::time::Duration;
use thiserror::Error;

/// Main error type for wikidice
#[derive(Error, Debug)]
pub enum WikidiceError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backing store could not be reached or handed out a connection
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// No category page exists under this (normalized) name
    #[error("There is no category called \"{0}\"")]
    CategoryNotFound(String),

    /// The category exists but has no pages within the depth bound
    #[error("Category \"{0}\" has no members")]
    NoMembers(String),

    /// The request governor gave up waiting on an operation
    #[error("{operation} took longer than {}ms", .timeout.as_millis())]
    DeadlineExceeded {
        operation: &'static str,
        timeout: Duration,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Task panicked or was torn down unexpectedly
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WikidiceError {
    /// Expected "nothing there" outcomes. These are user facing, not faults.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CategoryNotFound(_) | Self::NoMembers(_))
    }

    /// Backing-store faults that must be logged and surfaced as internal errors.
    pub fn is_store_fault(&self) -> bool {
        matches!(self, Self::Database(_) | Self::StoreUnavailable(_))
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }
}

/// Convenient Result type using WikidiceError
pub type Result<T> = std::result::Result<T, WikidiceError>;
