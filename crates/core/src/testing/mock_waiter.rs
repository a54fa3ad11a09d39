//! Mock output waiter for testing.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::convergence::{sample_outputs, OutputWaiter};

use super::journal::CallJournal;

/// A recorded wait for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWait {
    pub expected: usize,
    pub timeout: Duration,
}

/// Mock implementation of the OutputWaiter trait.
///
/// Takes a single directory sample instead of waiting for stability: the
/// wait succeeds when enough fresh PDFs are already present.
#[derive(Debug, Clone, Default)]
pub struct MockOutputWaiter {
    waits: Arc<RwLock<Vec<RecordedWait>>>,
    force_timeout: Arc<RwLock<bool>>,
    journal: CallJournal,
}

impl MockOutputWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Makes every wait time out.
    pub async fn set_force_timeout(&self, force: bool) {
        *self.force_timeout.write().await = force;
    }

    pub async fn recorded_waits(&self) -> Vec<RecordedWait> {
        self.waits.read().await.clone()
    }
}

#[async_trait]
impl OutputWaiter for MockOutputWaiter {
    async fn wait_for(
        &self,
        dir: &Path,
        expected: usize,
        timeout: Duration,
        since: SystemTime,
    ) -> Vec<String> {
        self.journal.record(format!("wait:{}", expected));
        self.waits
            .write()
            .await
            .push(RecordedWait { expected, timeout });

        if expected == 0 || *self.force_timeout.read().await {
            return Vec::new();
        }

        match sample_outputs(dir, since).await {
            Ok(sample) if sample.files.len() >= expected && sample.total_bytes > 0 => sample.files,
            _ => Vec::new(),
        }
    }
}
