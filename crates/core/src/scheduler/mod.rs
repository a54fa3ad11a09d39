//! Single-instance batch scheduler.
//!
//! The scheduler owns the process lock. It polls for eligible registrations,
//! processes them one at a time, sleeps for a fixed interval and repeats until
//! shut down. States: `Idle -> LockAcquired -> Polling -> ProcessingBatch ->
//! Sleeping -> Polling ... -> ShuttingDown`.

mod batch;
mod config;
mod error;
mod types;

pub use batch::{BatchScheduler, ShutdownHandle};
pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use types::{BatchReport, RunOutcome, SchedulerState};
