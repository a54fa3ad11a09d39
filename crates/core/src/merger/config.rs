//! Configuration for the merger.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// External merge tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergerConfig {
    /// Path to the merge executable.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Merge timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Extra arguments inserted before the output file argument.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_executable() -> PathBuf {
    PathBuf::from("gs")
}

fn default_timeout() -> u64 {
    120
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            timeout_secs: default_timeout(),
            extra_args: Vec::new(),
        }
    }
}

impl MergerConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            ..Default::default()
        }
    }

    /// Sets the merge timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
