//! Scheduler state and reporting types.

use std::fmt;

use uuid::Uuid;

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    LockAcquired,
    Polling,
    ProcessingBatch,
    Sleeping,
    ShuttingDown,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::LockAcquired => "lock_acquired",
            Self::Polling => "polling",
            Self::ProcessingBatch => "processing_batch",
            Self::Sleeping => "sleeping",
            Self::ShuttingDown => "shutting_down",
        };
        f.write_str(s)
    }
}

/// How a scheduler run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another live instance holds the lock. Nothing was touched.
    LockHeld,
    /// The loop was shut down and resources were released.
    Stopped,
    /// Another instance took the lock over while running. The loop stopped
    /// and the other instance's lock file was left in place.
    LockLost,
}

/// Summary of one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_id: Uuid,
    /// Registrations listed as eligible.
    pub eligible: usize,
    /// Registrations that completed, including those whose delivery failed.
    pub succeeded: usize,
    pub failed: usize,
    /// Completed registrations whose delivery failed.
    pub delivery_failures: usize,
}

impl BatchReport {
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            eligible: 0,
            succeeded: 0,
            failed: 0,
            delivery_failures: 0,
        }
    }

    /// Registrations not reached because of shutdown.
    pub fn unprocessed(&self) -> usize {
        self.eligible.saturating_sub(self.succeeded + self.failed)
    }
}
