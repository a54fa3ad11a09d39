//! Per-registration failure taxonomy.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::merger::MergeError;
use crate::registration::{PersistenceError, RegistrationError};
use crate::report::InvocationError;

/// Stages of one registration's run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cleanup,
    Plan,
    Invoke,
    Converge,
    Organize,
    Merge,
    Deliver,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleanup => "cleanup",
            Self::Plan => "plan",
            Self::Invoke => "invoke",
            Self::Converge => "converge",
            Self::Organize => "organize",
            Self::Merge => "merge",
            Self::Deliver => "deliver",
            Self::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a registration did not complete. The registration stays eligible.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Querying the registration source failed.
    #[error("registration query failed: {0}")]
    Source(#[from] RegistrationError),

    /// Stale outputs could not be removed.
    #[error("failed to clean up stale outputs in {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No report job could be planned for the registration.
    #[error("no reports to generate")]
    NothingToGenerate,

    /// The report engine failed for one item.
    #[error("report for {code} failed: {source}")]
    Invocation {
        code: String,
        #[source]
        source: InvocationError,
    },

    /// The expected outputs never stabilized.
    #[error("expected {expected} reports did not converge within {timeout_secs}s")]
    ConvergenceTimeout { expected: usize, timeout_secs: u64 },

    /// Outputs could not be moved into the per-patient folder.
    #[error("failed to organize outputs into {path}: {source}")]
    Organize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    /// The final flag update failed or timed out.
    #[error("{0}")]
    Persistence(#[from] PersistenceError),

    /// Shutdown was requested before the stage started.
    #[error("interrupted by shutdown before {0}")]
    Interrupted(Stage),
}

impl PipelineError {
    /// Stage the failure belongs to, for log context.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Source(_) | Self::NothingToGenerate => Stage::Plan,
            Self::Cleanup { .. } => Stage::Cleanup,
            Self::Invocation { .. } => Stage::Invoke,
            Self::ConvergenceTimeout { .. } => Stage::Converge,
            Self::Organize { .. } => Stage::Organize,
            Self::Merge(_) => Stage::Merge,
            Self::Persistence(_) => Stage::Persist,
            Self::Interrupted(stage) => *stage,
        }
    }

    /// Whether the failure means the registration was already delivered but
    /// not recorded, so a retry will deliver it again.
    pub fn risks_duplicate_delivery(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(PipelineError::NothingToGenerate.stage(), Stage::Plan);
        assert_eq!(
            PipelineError::ConvergenceTimeout {
                expected: 2,
                timeout_secs: 120
            }
            .stage(),
            Stage::Converge
        );
        assert_eq!(
            PipelineError::Persistence(PersistenceError::Timeout { timeout_secs: 30 }).stage(),
            Stage::Persist
        );
        assert_eq!(
            PipelineError::Interrupted(Stage::Merge).stage(),
            Stage::Merge
        );
    }

    #[test]
    fn test_only_persistence_risks_duplicates() {
        assert!(PipelineError::Persistence(PersistenceError::Closed).risks_duplicate_delivery());
        assert!(!PipelineError::Merge(MergeError::NoInputs {
            dir: PathBuf::from("/out/R1")
        })
        .risks_duplicate_delivery());
    }
}
