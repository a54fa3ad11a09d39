//! Error types for the registration module.

use thiserror::Error;

/// Errors from read-only registration queries.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The database rejected the query or could not be opened.
    #[error("Database error: {0}")]
    Database(String),

    /// The database handle was closed during shutdown.
    #[error("Database handle is closed")]
    Closed,
}

impl From<rusqlite::Error> for RegistrationError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Errors from the final processing-flag update.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The update failed in the database.
    #[error("Failed to mark registration processed: {0}")]
    Database(String),

    /// The update did not finish within the overall timeout. It was
    /// cancelled, but may have committed just before the cancellation.
    #[error(
        "Marking registration processed timed out after {timeout_secs} seconds; \
         the update was cancelled but may already have been applied"
    )]
    Timeout { timeout_secs: u64 },

    /// The update was cancelled before it ran.
    #[error("Marking registration processed was cancelled before it ran")]
    Cancelled,

    /// The database handle was closed during shutdown.
    #[error("Database handle is closed")]
    Closed,
}

impl From<RegistrationError> for PersistenceError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::Database(msg) => Self::Database(msg),
            RegistrationError::Closed => Self::Closed,
        }
    }
}
