//! Pipeline outcome types.

use std::path::PathBuf;

use crate::delivery::MessageId;
use crate::report::ReportJob;

/// Report jobs planned for one registration, fixed before any invocation.
#[derive(Debug, Clone, Default)]
pub struct JobPlan {
    /// Group-code jobs first, then mega-code jobs.
    pub jobs: Vec<ReportJob>,
    /// Mega codes without a template profile.
    pub skipped_codes: Vec<String>,
}

impl JobPlan {
    /// Number of outputs the convergence stage waits for.
    pub fn expected_outputs(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Result of the best-effort delivery stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The message was accepted by the messaging API.
    Sent(MessageId),
    /// A delivery step failed.
    Failed(String),
    /// Delivery was not attempted.
    Skipped(String),
}

impl DeliveryStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// A registration that completed the pipeline.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub reg_key: String,
    pub reports_generated: usize,
    /// The merged or renamed artifact.
    pub artifact: PathBuf,
    pub delivery: DeliveryStatus,
    /// False when the flag was already set by an earlier run.
    pub marked: bool,
}
