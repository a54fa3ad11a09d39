//! Error types for the merger module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while producing the merged artifact.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The directory holds no PDF to merge.
    #[error("No PDF files to merge in {dir}")]
    NoInputs { dir: PathBuf },

    /// Merge executable not found.
    #[error("Merge tool not found at path: {path}")]
    ExecutableNotFound { path: PathBuf },

    /// The merge tool exited unsuccessfully.
    #[error("Merge tool failed with exit code {exit_code:?}")]
    ToolFailed {
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    /// The merge tool reported success but produced nothing.
    #[error("Merge tool produced no output at {path}")]
    MissingOutput { path: PathBuf },

    /// The merge tool timed out.
    #[error("Merge timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while listing, renaming or cleaning up.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MergeError {
    /// Creates a tool failure error, keeping stderr only when it says something.
    pub fn tool_failed(exit_code: Option<i32>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        Self::ToolFailed {
            exit_code,
            stderr: (!stderr.is_empty()).then(|| stderr.to_string()),
        }
    }
}
