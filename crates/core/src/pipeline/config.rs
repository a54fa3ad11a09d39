//! Settings for the registration processor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;

/// Settings derived from the root configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Shared directory the report engine writes into.
    pub output_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub template_extension: String,
    /// Operator label passed to every report.
    pub operator: String,
    pub convergence_timeout: Duration,
    /// Overall bound on the final flag update.
    pub persist_timeout: Duration,
    pub default_country_code: String,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.reports.output_dir().to_path_buf(),
            templates_dir: config.reports.templates_dir.clone(),
            template_extension: config.reports.template_extension.clone(),
            operator: config.reports.operator.clone(),
            convergence_timeout: config.convergence.timeout(),
            persist_timeout: config.scheduler.persist_timeout(),
            default_country_code: config.delivery.default_country_code.clone(),
        }
    }

    /// Settings for tests and local runs, with short timeouts.
    pub fn new(output_dir: impl Into<PathBuf>, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            templates_dir: templates_dir.into(),
            template_extension: "rpt".to_string(),
            operator: "courier".to_string(),
            convergence_timeout: Duration::from_secs(5),
            persist_timeout: Duration::from_secs(5),
            default_country_code: "20".to_string(),
        }
    }

    /// Template file for a template name.
    pub fn template_path(&self, name: &str) -> PathBuf {
        if self.template_extension.is_empty() {
            self.templates_dir.join(name)
        } else {
            self.templates_dir
                .join(format!("{}.{}", name, self.template_extension))
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_from_config() {
        let config = load_config_from_str(
            r#"
[database]
path = "/data/lab.db"

[reports]
executable = "/opt/export"
templates_dir = "/mnt/templates"
output_dir = "/mnt/out"
operator = "night-shift"

[convergence]
timeout_secs = 90

[scheduler]
persist_timeout_secs = 10
"#,
        )
        .unwrap();

        let pipeline = PipelineConfig::from_config(&config);
        assert_eq!(pipeline.output_dir(), Path::new("/mnt/out"));
        assert_eq!(pipeline.operator, "night-shift");
        assert_eq!(pipeline.convergence_timeout, Duration::from_secs(90));
        assert_eq!(pipeline.persist_timeout, Duration::from_secs(10));
        assert_eq!(
            pipeline.template_path("CBC"),
            PathBuf::from("/mnt/templates/CBC.rpt")
        );
    }
}
