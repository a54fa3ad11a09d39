//! Mock report invoker for testing.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::report::{InvocationError, InvocationOutput, ReportInvoker, ReportJob};

use super::journal::CallJournal;

/// Mock implementation of the ReportInvoker trait.
///
/// When an output directory is set, every successful job writes
/// `<code>.pdf` there, standing in for the external engine.
#[derive(Debug, Clone, Default)]
pub struct MockReportInvoker {
    jobs: Arc<RwLock<Vec<ReportJob>>>,
    failing_codes: Arc<RwLock<BTreeSet<String>>>,
    silent_codes: Arc<RwLock<BTreeSet<String>>>,
    output_dir: Option<PathBuf>,
    delay: Option<Duration>,
    journal: CallJournal,
}

impl MockReportInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a PDF per successful job into `dir`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Sleeps for `delay` before each job finishes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Jobs for `code` exit with a failure code.
    pub async fn fail_code(&self, code: &str) {
        self.failing_codes.write().await.insert(code.to_string());
    }

    /// Jobs for `code` succeed without writing any output.
    pub async fn silence_code(&self, code: &str) {
        self.silent_codes.write().await.insert(code.to_string());
    }

    /// All jobs invoked so far, in call order.
    pub async fn recorded_jobs(&self) -> Vec<ReportJob> {
        self.jobs.read().await.clone()
    }

    pub async fn invocation_count(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl ReportInvoker for MockReportInvoker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, job: &ReportJob) -> Result<InvocationOutput, InvocationError> {
        self.journal.record(format!("invoke:{}", job.item_code));
        self.jobs.write().await.push(job.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_codes.read().await.contains(&job.item_code) {
            return Err(InvocationError::failed(
                job.template_path.clone(),
                Some(1),
                "mock engine failure",
            ));
        }

        if let Some(dir) = &self.output_dir {
            if !self.silent_codes.read().await.contains(&job.item_code) {
                let path = dir.join(format!("{}.pdf", job.item_code));
                let body = format!("%PDF-1.4 {} {}", job.reg_key, job.item_code);
                tokio::fs::write(&path, body).await?;
            }
        }

        Ok(InvocationOutput {
            exit_code: Some(3),
            ..Default::default()
        })
    }
}
