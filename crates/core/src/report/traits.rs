//! Trait definitions for the report module.

use async_trait::async_trait;

use super::error::InvocationError;
use super::types::{InvocationOutput, ReportJob};

/// Something that renders one report per call.
///
/// A successful call is expected, not guaranteed, to leave one new file in the
/// shared output directory; callers verify that separately.
#[async_trait]
pub trait ReportInvoker: Send + Sync {
    /// Returns the name of this invoker implementation.
    fn name(&self) -> &str;

    /// Renders one report and waits for the engine to exit.
    async fn invoke(&self, job: &ReportJob) -> Result<InvocationOutput, InvocationError>;
}
