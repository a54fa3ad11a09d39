//! Configuration for the report module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the external report engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Path to the report engine executable.
    pub executable: PathBuf,

    /// Directory holding report templates (often a network share).
    pub templates_dir: PathBuf,

    /// Template file extension, without the dot.
    #[serde(default = "default_template_extension")]
    pub template_extension: String,

    /// Shared directory the engine writes rendered PDFs into.
    pub output_dir: PathBuf,

    /// Timeout for a single invocation in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Exit codes that mean the export succeeded.
    #[serde(default = "default_success_exit_codes")]
    pub success_exit_codes: Vec<i32>,

    /// Export destination type passed to the engine.
    #[serde(default = "default_destination_type")]
    pub destination_type: String,

    /// Operator label passed as a report parameter.
    #[serde(default = "default_operator")]
    pub operator: String,

    /// Working directory for the engine process.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Database credentials embedded in the engine arguments.
    #[serde(default)]
    pub credentials: ReportCredentials,

    /// Environment overrides for the engine process (e.g. HOME, PATH).
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Database credentials the report engine connects with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportCredentials {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_template_extension() -> String {
    "rpt".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_success_exit_codes() -> Vec<i32> {
    vec![0, 3]
}

fn default_destination_type() -> String {
    "pdf".to_string()
}

fn default_operator() -> String {
    "courier".to_string()
}

impl ReportConfig {
    /// Creates a config with default settings for the given paths.
    pub fn new(
        executable: impl Into<PathBuf>,
        templates_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable: executable.into(),
            templates_dir: templates_dir.into(),
            template_extension: default_template_extension(),
            output_dir: output_dir.into(),
            timeout_secs: default_timeout(),
            success_exit_codes: default_success_exit_codes(),
            destination_type: default_destination_type(),
            operator: default_operator(),
            working_dir: None,
            credentials: ReportCredentials::default(),
            env: BTreeMap::new(),
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the database credentials.
    pub fn with_credentials(mut self, credentials: ReportCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Adds an environment override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Invocation timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full template path for a template name.
    pub fn template_path(&self, name: &str) -> PathBuf {
        let file = if self.template_extension.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, self.template_extension)
        };
        self.templates_dir.join(file)
    }

    /// Whether an exit code means success.
    pub fn is_success_code(&self, code: i32) -> bool {
        self.success_exit_codes.contains(&code)
    }

    /// The shared output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReportConfig::new("/opt/export", "/mnt/templates", "/mnt/out");
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(config.is_success_code(0));
        assert!(config.is_success_code(3));
        assert!(!config.is_success_code(1));
        assert_eq!(config.destination_type, "pdf");
    }

    #[test]
    fn test_template_path() {
        let config = ReportConfig::new("/opt/export", "/mnt/templates", "/mnt/out");
        assert_eq!(
            config.template_path("CBC"),
            PathBuf::from("/mnt/templates/CBC.rpt")
        );

        let mut bare = config.clone();
        bare.template_extension.clear();
        assert_eq!(bare.template_path("CBC"), PathBuf::from("/mnt/templates/CBC"));
    }

    #[test]
    fn test_deserialize_env_and_credentials() {
        let toml = r#"
executable = "/opt/export"
templates_dir = "/mnt/templates"
output_dir = "/mnt/out"
success_exit_codes = [3]

[credentials]
server = "LABSRV"
username = "reporter"
password = "pw"

[env]
HOME = "/srv/reports"
"#;
        let config: ReportConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.success_exit_codes, vec![3]);
        assert_eq!(config.credentials.server, "LABSRV");
        assert_eq!(config.credentials.database, "");
        assert_eq!(config.env.get("HOME").map(String::as_str), Some("/srv/reports"));
    }
}
