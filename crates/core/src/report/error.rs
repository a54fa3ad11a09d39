//! Error types for the report module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort the current registration's report generation.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// Report engine binary not found.
    #[error("Report engine not found at path: {path}")]
    ExecutableNotFound { path: PathBuf },

    /// The engine exited with a code outside the success set.
    #[error("Report engine failed for {template} (exit code {exit_code:?})")]
    Failed {
        template: PathBuf,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    /// The engine did not finish in time and was killed.
    #[error("Report engine timed out after {timeout_secs} seconds for {template}")]
    Timeout { template: PathBuf, timeout_secs: u64 },

    /// I/O error while spawning or waiting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InvocationError {
    /// Creates a failed error from captured stderr.
    pub fn failed(template: impl Into<PathBuf>, exit_code: Option<i32>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        Self::Failed {
            template: template.into(),
            exit_code,
            stderr: if stderr.is_empty() {
                None
            } else {
                Some(stderr.to_string())
            },
        }
    }

    /// Whether a later batch is likely to succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}
