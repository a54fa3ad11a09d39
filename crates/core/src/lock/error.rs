//! Error types for the lock module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while managing the lock file.
///
/// Contention with a live instance is not an error; see `ProcessLock::try_acquire`.
#[derive(Debug, Error)]
pub enum LockError {
    /// Reading, writing or removing the lock file failed.
    #[error("Lock file I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The lock file no longer carries this instance's record.
    #[error("Lock at {path} is no longer held by this instance (found {holder})")]
    Lost { path: PathBuf, holder: String },

    /// The lock record could not be serialized.
    #[error("Failed to serialize lock record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl LockError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
