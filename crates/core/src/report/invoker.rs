//! External report engine invoker.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::command::ReportCommand;
use super::config::ReportConfig;
use super::error::InvocationError;
use super::traits::ReportInvoker;
use super::types::{InvocationOutput, ReportJob};

/// How long to keep reading output after the engine exits. A helper the
/// engine left running can hold the pipes open indefinitely.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Invoker that spawns the configured report engine once per job.
pub struct ExternalReportInvoker {
    config: ReportConfig,
}

impl ExternalReportInvoker {
    /// Creates a new invoker with the given configuration.
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Returns the invoker configuration.
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }
}

#[async_trait]
impl ReportInvoker for ExternalReportInvoker {
    fn name(&self) -> &str {
        "external"
    }

    async fn invoke(&self, job: &ReportJob) -> Result<InvocationOutput, InvocationError> {
        let command = ReportCommand::for_job(&self.config, job);
        debug!(
            reg_key = %job.reg_key,
            code = %job.item_code,
            program = %command.program().display(),
            args = ?command.redacted_args(),
            "Invoking report engine"
        );

        let start = Instant::now();
        let mut child = command.to_command().spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InvocationError::ExecutableNotFound {
                    path: self.config.executable.clone(),
                }
            } else {
                InvocationError::Io(e)
            }
        })?;

        let stdout = PipeDrain::spawn(child.stdout.take());
        let stderr = PipeDrain::spawn(child.stderr.take());

        let status = match timeout(self.config.timeout(), child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stdout.abort();
                stderr.abort();
                return Err(InvocationError::Io(e));
            }
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                stdout.abort();
                stderr.abort();
                warn!(
                    reg_key = %job.reg_key,
                    code = %job.item_code,
                    timeout_secs = self.config.timeout_secs,
                    "Report engine timed out"
                );
                return Err(InvocationError::Timeout {
                    template: job.template_path.clone(),
                    timeout_secs: self.config.timeout_secs,
                });
            }
        };
        let (stdout, stderr) =
            tokio::join!(stdout.finish(OUTPUT_GRACE), stderr.finish(OUTPUT_GRACE));

        let output = InvocationOutput {
            exit_code: status.code(),
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        match output.exit_code {
            Some(code) if self.config.is_success_code(code) => {
                debug!(
                    reg_key = %job.reg_key,
                    code = %job.item_code,
                    exit_code = code,
                    duration_ms = output.duration_ms,
                    "Report engine finished"
                );
                Ok(output)
            }
            exit_code => Err(InvocationError::failed(
                job.template_path.clone(),
                exit_code,
                &output.stderr,
            )),
        }
    }
}

/// Reads a child pipe in the background so the exit status can be awaited
/// on its own.
struct PipeDrain {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl PipeDrain {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!(error = %e, "Failed to read report engine output");
                        break;
                    }
                }
            }
        });
        Self { buffer, task }
    }

    fn abort(&self) {
        self.task.abort();
    }

    /// Waits up to `grace` for end of output and returns what was read.
    async fn finish(mut self, grace: Duration) -> String {
        if timeout(grace, &mut self.task).await.is_err() {
            self.task.abort();
            debug!("Report engine output still open after exit, keeping what was read");
        }
        let bytes = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).to_string()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn invoker_for(script: PathBuf, dir: &Path) -> ExternalReportInvoker {
        let mut config = ReportConfig::new(script, dir.join("templates"), dir.join("out"));
        config.timeout_secs = 2;
        ExternalReportInvoker::new(config)
    }

    fn job() -> ReportJob {
        ReportJob::new("/templates/CBC.rpt", "R1", "CBC", "courier")
    }

    #[tokio::test]
    async fn test_exit_code_three_is_success() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "engine.sh", "echo exported\nexit 3");
        let invoker = invoker_for(script, dir.path());

        let output = invoker.invoke(&job()).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(output.stdout.contains("exported"));
    }

    #[tokio::test]
    async fn test_exit_code_zero_is_success() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "engine.sh", "exit 0");
        let invoker = invoker_for(script, dir.path());

        assert!(invoker.invoke(&job()).await.is_ok());
    }

    #[tokio::test]
    async fn test_other_exit_code_fails_with_stderr() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "engine.sh", "echo 'template missing' >&2\nexit 1");
        let invoker = invoker_for(script, dir.path());

        let err = invoker.invoke(&job()).await.unwrap_err();
        match err {
            InvocationError::Failed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr.as_deref(), Some("template missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_arguments_are_passed_verbatim() {
        let dir = TempDir::new().unwrap();
        let args_file = dir.path().join("args.txt");
        let script = write_script(
            dir.path(),
            "engine.sh",
            &format!(
                "for a in \"$@\"; do echo \"$a\" >> '{}'; done\nexit 3",
                args_file.display()
            ),
        );
        let invoker = invoker_for(script, dir.path());
        let job = ReportJob::new("/templates/with space.rpt", "R;1", "CBC", "courier");

        invoker.invoke(&job).await.unwrap();
        let recorded = std::fs::read_to_string(&args_file).unwrap();
        let lines: Vec<&str> = recorded.lines().collect();
        assert!(lines.contains(&"/templates/with space.rpt"));
        assert!(lines.contains(&"regkey=R;1"));
    }

    #[tokio::test]
    async fn test_env_overrides_are_applied() {
        let dir = TempDir::new().unwrap();
        let env_file = dir.path().join("env.txt");
        let script = write_script(
            dir.path(),
            "engine.sh",
            &format!("echo \"$REPORT_HOME\" > '{}'\nexit 3", env_file.display()),
        );
        let mut config = ReportConfig::new(script, dir.path(), dir.path())
            .with_env("REPORT_HOME", "/srv/reports");
        config.timeout_secs = 2;
        let invoker = ExternalReportInvoker::new(config);

        invoker.invoke(&job()).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&env_file).unwrap().trim(),
            "/srv/reports"
        );
    }

    #[tokio::test]
    async fn test_timeout_kills_engine() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "engine.sh", "sleep 30");
        let mut config = ReportConfig::new(script, dir.path(), dir.path());
        config.timeout_secs = 1;
        let invoker = ExternalReportInvoker::new(config);

        let started = Instant::now();
        let err = invoker.invoke(&job()).await.unwrap_err();
        assert!(matches!(err, InvocationError::Timeout { timeout_secs: 1, .. }));
        assert!(err.is_retryable());
        assert!(started.elapsed().as_secs() < 10);
    }

    #[tokio::test]
    async fn test_exit_is_reported_while_helper_holds_output_open() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            dir.path(),
            "engine.sh",
            "sleep 5 &\necho exported\nexit 3",
        );
        let invoker = invoker_for(script, dir.path());

        let started = Instant::now();
        let output = invoker.invoke(&job()).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(output.stdout.contains("exported"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let dir = TempDir::new().unwrap();
        let invoker = invoker_for(dir.path().join("nope"), dir.path());
        let err = invoker.invoke(&job()).await.unwrap_err();
        assert!(matches!(err, InvocationError::ExecutableNotFound { .. }));
    }
}
