use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::convergence::ConvergenceConfig;
use crate::delivery::DeliveryConfig;
use crate::lock::LockConfig;
use crate::merger::MergerConfig;
use crate::registration::DatabaseConfig;
use crate::report::ReportConfig;
use crate::scheduler::SchedulerConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub reports: ReportConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub convergence: ConvergenceConfig,
    #[serde(default)]
    pub merger: MergerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Full path of the lock file inside the shared output directory.
    pub fn lock_path(&self) -> PathBuf {
        self.reports.output_dir().join(&self.lock.file_name)
    }
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file_prefix: default_log_prefix(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_prefix() -> String {
    "courier.log".to_string()
}

/// Sanitized config for log output (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub database: DatabaseConfig,
    pub reports: SanitizedReportConfig,
    pub lock: LockConfig,
    pub convergence: ConvergenceConfig,
    pub merger: MergerConfig,
    pub delivery: SanitizedDeliveryConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// Report invoker config with the database password hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedReportConfig {
    pub executable: PathBuf,
    pub templates_dir: PathBuf,
    pub output_dir: PathBuf,
    pub timeout_secs: u64,
    pub success_exit_codes: Vec<i32>,
    pub credentials_server: String,
    pub credentials_database: String,
    pub credentials_username: String,
    pub password_configured: bool,
    pub env_overrides: Vec<String>,
}

/// Delivery config with the access key hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDeliveryConfig {
    pub enabled: bool,
    pub base_url: String,
    pub workspace_id: String,
    pub channel_id: String,
    pub project_id: String,
    pub template_version: String,
    pub locale: String,
    pub access_key_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let reports = &config.reports;
        let delivery = &config.delivery;
        Self {
            database: config.database.clone(),
            reports: SanitizedReportConfig {
                executable: reports.executable.clone(),
                templates_dir: reports.templates_dir.clone(),
                output_dir: reports.output_dir.clone(),
                timeout_secs: reports.timeout_secs,
                success_exit_codes: reports.success_exit_codes.clone(),
                credentials_server: reports.credentials.server.clone(),
                credentials_database: reports.credentials.database.clone(),
                credentials_username: reports.credentials.username.clone(),
                password_configured: !reports.credentials.password.is_empty(),
                env_overrides: reports.env.keys().cloned().collect(),
            },
            lock: config.lock.clone(),
            convergence: config.convergence.clone(),
            merger: config.merger.clone(),
            delivery: SanitizedDeliveryConfig {
                enabled: delivery.enabled,
                base_url: delivery.base_url.clone(),
                workspace_id: delivery.workspace_id.clone(),
                channel_id: delivery.channel_id.clone(),
                project_id: delivery.project_id.clone(),
                template_version: delivery.template_version.clone(),
                locale: delivery.locale.clone(),
                access_key_configured: !delivery.access_key.is_empty(),
                timeout_secs: delivery.timeout_secs,
            },
            scheduler: config.scheduler.clone(),
            logging: config.logging.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[database]
path = "/data/lab.db"

[reports]
executable = "/opt/reports/export"
templates_dir = "/mnt/templates"
output_dir = "/mnt/out"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.database.path.to_str().unwrap(), "/data/lab.db");
        assert_eq!(config.reports.timeout_secs, 60);
        assert_eq!(config.reports.success_exit_codes, vec![0, 3]);
        assert_eq!(config.lock.stale_after_secs, 300);
        assert_eq!(config.convergence.poll_interval_ms, 1000);
        assert_eq!(config.scheduler.interval_secs, 120);
        assert_eq!(config.scheduler.persist_timeout_secs, 30);
        assert!(!config.delivery.enabled);
        assert_eq!(config.delivery.locale, "ar");
        assert_eq!(config.logging.file_prefix, "courier.log");
    }

    #[test]
    fn test_lock_path_is_inside_output_dir() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.lock_path(), PathBuf::from("/mnt/out/.courier.lock"));
    }

    #[test]
    fn test_deserialize_missing_reports_fails() {
        let toml = r#"
[database]
path = "/data/lab.db"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let toml = format!(
            r#"{}
[reports.credentials]
server = "LABSRV"
database = "lab"
username = "reporter"
password = "hunter2"

[reports.env]
HOME = "C:\\reports"

[delivery]
enabled = true
workspace_id = "ws"
channel_id = "ch"
access_key = "secret-key"
project_id = "proj"
template_version = "v1"
"#,
            MINIMAL
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        assert!(sanitized.reports.password_configured);
        assert_eq!(sanitized.reports.env_overrides, vec!["HOME".to_string()]);
        assert!(sanitized.delivery.access_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("secret-key"));
    }
}
