//! Types for report jobs.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Report parameter carrying the registration key.
pub const PARAM_REG_KEY: &str = "regkey";
/// Report parameter carrying the test item code.
pub const PARAM_CODE: &str = "code";
/// Report parameter carrying the operator label.
pub const PARAM_OPERATOR: &str = "user";

/// One report to render: a template plus its parameters.
///
/// Created per test item per registration; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportJob {
    /// Template file the engine renders.
    pub template_path: PathBuf,
    /// Registration the report belongs to.
    pub reg_key: String,
    /// Test item code (group or mega code).
    pub item_code: String,
    /// Parameters passed as `KEY=VALUE`, in key order.
    pub parameters: BTreeMap<String, String>,
}

impl ReportJob {
    /// Creates a job with the standard parameter set.
    pub fn new(
        template_path: impl Into<PathBuf>,
        reg_key: impl Into<String>,
        item_code: impl Into<String>,
        operator: impl Into<String>,
    ) -> Self {
        let reg_key = reg_key.into();
        let item_code = item_code.into();
        let mut parameters = BTreeMap::new();
        parameters.insert(PARAM_REG_KEY.to_string(), reg_key.clone());
        parameters.insert(PARAM_CODE.to_string(), item_code.clone());
        parameters.insert(PARAM_OPERATOR.to_string(), operator.into());

        Self {
            template_path: template_path.into(),
            reg_key,
            item_code,
            parameters,
        }
    }
}

/// Captured result of a finished engine process.
#[derive(Debug, Clone, Default)]
pub struct InvocationOutput {
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Wall time of the invocation.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_parameters() {
        let job = ReportJob::new("/t/CBC.rpt", "R1", "CBC", "courier");
        assert_eq!(job.parameters.len(), 3);
        assert_eq!(job.parameters[PARAM_REG_KEY], "R1");
        assert_eq!(job.parameters[PARAM_CODE], "CBC");
        assert_eq!(job.parameters[PARAM_OPERATOR], "courier");
    }
}
