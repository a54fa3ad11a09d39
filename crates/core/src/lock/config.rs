//! Configuration for the process lock.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock file name, created inside the shared output directory.
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Age in seconds after which a lock record is considered abandoned.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// Whether to terminate the recorded process before taking over a stale lock.
    #[serde(default = "default_terminate")]
    pub terminate_stale_holder: bool,
}

fn default_file_name() -> String {
    ".courier.lock".to_string()
}

fn default_stale_after() -> u64 {
    300 // 5 minutes
}

fn default_terminate() -> bool {
    true
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            stale_after_secs: default_stale_after(),
            terminate_stale_holder: default_terminate(),
        }
    }
}

impl LockConfig {
    /// Staleness threshold as a duration.
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Interval between heartbeat refreshes: a third of the staleness
    /// threshold, never below 100ms.
    pub fn heartbeat_interval(&self) -> Duration {
        (self.stale_after() / 3).max(Duration::from_millis(100))
    }

    /// Sets the staleness threshold in seconds.
    pub fn with_stale_after(mut self, secs: u64) -> Self {
        self.stale_after_secs = secs;
        self
    }

    /// Enables or disables terminating a stale holder.
    pub fn with_terminate_stale_holder(mut self, enabled: bool) -> Self {
        self.terminate_stale_holder = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LockConfig::default();
        assert_eq!(config.file_name, ".courier.lock");
        assert_eq!(config.stale_after(), Duration::from_secs(300));
        assert!(config.terminate_stale_holder);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(100));
    }

    #[test]
    fn test_heartbeat_interval_floor() {
        let config = LockConfig::default().with_stale_after(0);
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LockConfig = toml::from_str("stale_after_secs = 60").unwrap();
        assert_eq!(config.stale_after_secs, 60);
        assert_eq!(config.file_name, ".courier.lock");
    }
}
