//! Error types for the scheduler.

use thiserror::Error;

use crate::lock::LockError;
use crate::registration::RegistrationError;

/// Errors that stop the scheduler or a whole batch.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The lock file could not be read or written.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// Building the pipeline dependencies failed.
    #[error("initialization failed: {0}")]
    Init(String),

    /// Listing eligible registrations failed.
    #[error("failed to list eligible registrations: {0}")]
    Source(#[from] RegistrationError),
}

impl SchedulerError {
    pub fn init(reason: impl std::fmt::Display) -> Self {
        Self::Init(reason.to_string())
    }
}
