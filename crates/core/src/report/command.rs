//! Typed argument builder for the report engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::config::ReportConfig;
use super::types::ReportJob;

const PASSWORD_FLAG: &str = "-P";

/// A fully built report engine invocation.
///
/// Arguments are kept as a vector and passed to the process directly; no
/// shell parses them.
#[derive(Debug, Clone)]
pub struct ReportCommand {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl ReportCommand {
    /// Builds the engine command for a job.
    ///
    /// Layout: `-F <template> -S <server> -D <database> -U <user> -P <password>
    /// -E <destination> -a KEY=VALUE ...`. Empty credentials are omitted.
    pub fn for_job(config: &ReportConfig, job: &ReportJob) -> Self {
        let mut args = vec![
            "-F".to_string(),
            job.template_path.to_string_lossy().to_string(),
        ];

        let credentials = &config.credentials;
        for (flag, value) in [
            ("-S", &credentials.server),
            ("-D", &credentials.database),
            ("-U", &credentials.username),
            (PASSWORD_FLAG, &credentials.password),
        ] {
            if !value.is_empty() {
                args.extend([flag.to_string(), value.clone()]);
            }
        }

        args.extend(["-E".to_string(), config.destination_type.clone()]);

        for (key, value) in &job.parameters {
            args.extend(["-a".to_string(), format!("{}={}", key, value)]);
        }

        Self {
            program: config.executable.clone(),
            args,
            env: config.env.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    /// Executable path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Argument vector, credentials included.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Argument vector safe for logging.
    pub fn redacted_args(&self) -> Vec<String> {
        let mut redacted = self.args.clone();
        let mut iter = redacted.iter_mut();
        while let Some(arg) = iter.next() {
            if arg.as_str() == PASSWORD_FLAG {
                if let Some(value) = iter.next() {
                    *value = "***".to_string();
                }
            }
        }
        redacted
    }

    /// Builds the process with stdin closed and stdout/stderr captured.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}
