//! Log output for the daemon.
//!
//! Every line goes to stdout and to a daily rolling file under the
//! configured directory. `RUST_LOG` overrides the default `info` filter.

use std::fs;
use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use courier_core::LoggingConfig;

/// Keeps the file writer alive. Dropping it flushes pending lines.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Builds the non-blocking daily file writer, creating the directory first.
fn file_writer(
    config: &LoggingConfig,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), io::Error> {
    fs::create_dir_all(&config.dir)?;
    let appender = tracing_appender::rolling::daily(&config.dir, &config.file_prefix);
    Ok(tracing_appender::non_blocking(appender))
}

/// Installs the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, io::Error> {
    let (file, file_guard) = file_writer(config)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(false);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            dir: dir.path().join("nested/logs"),
            file_prefix: "courier.log".to_string(),
        };

        let (mut writer, guard) = file_writer(&config).unwrap();
        writer.write_all(b"hello\n").unwrap();
        drop(writer);
        drop(guard);

        assert!(config.dir.is_dir());
        let written: Vec<_> = fs::read_dir(&config.dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(written.len(), 1);
        assert!(written[0].starts_with("courier.log"));
    }
}
