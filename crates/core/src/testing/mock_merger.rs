//! Mock artifact merger for testing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::merger::{list_pdfs, ArtifactMerger, MergeError};

use super::journal::CallJournal;

/// Name of the artifact the mock produces inside the merged folder.
pub const MOCK_ARTIFACT_NAME: &str = "merged.pdf";

/// Mock implementation of the ArtifactMerger trait.
///
/// Concatenates the folder's PDFs in name order into `merged.pdf` and
/// removes the sources, so tests can inspect real files.
#[derive(Debug, Clone, Default)]
pub struct MockMerger {
    merged_dirs: Arc<RwLock<Vec<PathBuf>>>,
    fail: Arc<RwLock<bool>>,
    journal: CallJournal,
}

impl MockMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Makes every merge fail as if the tool crashed.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn merged_dirs(&self) -> Vec<PathBuf> {
        self.merged_dirs.read().await.clone()
    }
}

#[async_trait]
impl ArtifactMerger for MockMerger {
    fn name(&self) -> &str {
        "mock"
    }

    async fn merge(&self, dir: &Path) -> Result<PathBuf, MergeError> {
        self.journal.record("merge");
        self.merged_dirs.write().await.push(dir.to_path_buf());

        if *self.fail.read().await {
            return Err(MergeError::tool_failed(Some(1), "mock merge failure"));
        }

        let inputs = list_pdfs(dir).await?;
        if inputs.is_empty() {
            return Err(MergeError::NoInputs {
                dir: dir.to_path_buf(),
            });
        }

        let output = dir.join(MOCK_ARTIFACT_NAME);
        let mut merged = Vec::new();
        for input in &inputs {
            merged.extend(tokio::fs::read(input).await?);
        }
        tokio::fs::write(&output, merged).await?;
        for input in inputs.iter().filter(|p| **p != output) {
            tokio::fs::remove_file(input).await?;
        }
        Ok(output)
    }
}
