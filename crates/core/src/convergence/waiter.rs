//! Polling convergence waiter.

use std::path::Path;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::config::ConvergenceConfig;
use super::traits::OutputWaiter;

/// One sample of the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSample {
    /// Matching file names, sorted.
    pub files: Vec<String>,
    /// Aggregate size of the matching files in bytes.
    pub total_bytes: u64,
}

/// Lists top-level `*.pdf` files in `dir` modified at or after `since`.
///
/// The extension match is case-insensitive. Subdirectories are not descended.
pub async fn sample_outputs(dir: &Path, since: SystemTime) -> std::io::Result<OutputSample> {
    let mut sample = OutputSample::default();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            continue;
        }

        // Files can vanish between listing and stat
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(_) => continue,
        };
        if !metadata.is_file() {
            continue;
        }
        match metadata.modified() {
            Ok(modified) if modified >= since => {}
            _ => continue,
        }

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            sample.files.push(name.to_string());
            sample.total_bytes += metadata.len();
        }
    }

    sample.files.sort();
    Ok(sample)
}

/// Waiter that samples the directory at a fixed interval.
pub struct ConvergenceWaiter {
    poll_interval: Duration,
}

impl ConvergenceWaiter {
    pub fn new(config: &ConvergenceConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
        }
    }

    /// Creates a waiter with an explicit poll interval.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

#[async_trait]
impl OutputWaiter for ConvergenceWaiter {
    async fn wait_for(
        &self,
        dir: &Path,
        expected: usize,
        timeout: Duration,
        since: SystemTime,
    ) -> Vec<String> {
        if expected == 0 {
            return Vec::new();
        }

        let deadline = Instant::now() + timeout;
        let mut previous_size: Option<u64> = None;
        let mut last = OutputSample::default();

        loop {
            match sample_outputs(dir, since).await {
                Ok(sample) => {
                    trace!(
                        files = sample.files.len(),
                        bytes = sample.total_bytes,
                        expected,
                        "Sampled output directory"
                    );
                    if sample.files.len() >= expected
                        && sample.total_bytes > 0
                        && previous_size == Some(sample.total_bytes)
                    {
                        debug!(
                            files = sample.files.len(),
                            bytes = sample.total_bytes,
                            "Output directory converged"
                        );
                        return sample.files;
                    }
                    previous_size = Some(sample.total_bytes);
                    last = sample;
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to sample output directory");
                    previous_size = None;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }

        warn!(
            dir = %dir.display(),
            expected,
            found = last.files.len(),
            bytes = last.total_bytes,
            timeout_secs = timeout.as_secs(),
            "Output did not converge before timeout"
        );
        Vec::new()
    }
}
