//! Trait definitions for the convergence module.

use std::path::Path;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

/// Waits for the shared output directory to settle.
#[async_trait]
pub trait OutputWaiter: Send + Sync {
    /// Waits until `expected` fresh PDFs exist in `dir` and have stopped growing.
    ///
    /// Returns the matched file names, or an empty list on timeout. An
    /// `expected` of zero returns an empty list immediately.
    async fn wait_for(
        &self,
        dir: &Path,
        expected: usize,
        timeout: Duration,
        since: SystemTime,
    ) -> Vec<String>;
}
