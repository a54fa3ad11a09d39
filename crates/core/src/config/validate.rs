use super::{types::Config, ConfigError};

/// Rejects settings the pipeline cannot run with.
///
/// Missing sections are already rejected while parsing. Delivery identifiers
/// are only checked when delivery is enabled.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let paths = [
        ("reports.executable", &config.reports.executable),
        ("merger.executable", &config.merger.executable),
    ];
    for (field, path) in paths {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::invalid(field, "must not be empty"));
        }
    }

    let durations = [
        ("reports.timeout_secs", config.reports.timeout_secs),
        ("merger.timeout_secs", config.merger.timeout_secs),
        ("convergence.poll_interval_ms", config.convergence.poll_interval_ms),
        ("convergence.timeout_secs", config.convergence.timeout_secs),
        ("lock.stale_after_secs", config.lock.stale_after_secs),
        ("scheduler.interval_secs", config.scheduler.interval_secs),
        ("scheduler.persist_timeout_secs", config.scheduler.persist_timeout_secs),
    ];
    for (field, value) in durations {
        if value == 0 {
            return Err(ConfigError::invalid(field, "must be greater than zero"));
        }
    }

    if config.reports.success_exit_codes.is_empty() {
        return Err(ConfigError::invalid(
            "reports.success_exit_codes",
            "must list at least one code",
        ));
    }

    if config.delivery.enabled {
        let delivery = &config.delivery;
        let required = [
            ("delivery.workspace_id", &delivery.workspace_id),
            ("delivery.channel_id", &delivery.channel_id),
            ("delivery.access_key", &delivery.access_key),
            ("delivery.project_id", &delivery.project_id),
            ("delivery.template_version", &delivery.template_version),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "required when delivery is enabled"));
            }
        }
    }

    Ok(())
}
