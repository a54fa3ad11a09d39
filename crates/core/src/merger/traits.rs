//! Trait definitions for the merger module.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::error::MergeError;

/// Combines the PDFs in a directory into one artifact.
#[async_trait]
pub trait ArtifactMerger: Send + Sync {
    /// Returns the name of this merger implementation.
    fn name(&self) -> &str;

    /// Merges every top-level PDF in `dir` and returns the artifact path.
    ///
    /// With zero inputs the directory is left untouched. On failure the
    /// source files are left intact.
    async fn merge(&self, dir: &Path) -> Result<PathBuf, MergeError>;
}
