//! Configuration for the batch scheduler.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Batch loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Sleep between batches in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Overall timeout for marking a registration processed, in seconds.
    #[serde(default = "default_persist_timeout")]
    pub persist_timeout_secs: u64,
}

fn default_interval() -> u64 {
    120
}

fn default_persist_timeout() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            persist_timeout_secs: default_persist_timeout(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }
}
