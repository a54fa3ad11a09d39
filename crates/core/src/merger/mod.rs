//! Artifact merging.
//!
//! Collapses the per-item PDFs of one Registration into a single artifact.
//! A lone PDF is renamed to a date-stamped name without touching the merge
//! tool; two or more are combined by an external pdfwrite-capable executable.

mod config;
mod error;
mod pdf_merger;
mod traits;

pub use config::MergerConfig;
pub use error::MergeError;
pub use pdf_merger::{artifact_name, list_pdfs, ExternalPdfMerger};
pub use traits::ArtifactMerger;
