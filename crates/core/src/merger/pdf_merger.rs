//! External PDF merger.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::config::MergerConfig;
use super::error::MergeError;
use super::traits::ArtifactMerger;

/// Lists top-level `*.pdf` files in `dir`, sorted by file name.
pub async fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, MergeError> {
    let mut pdfs = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf && entry.file_type().await?.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

/// Date-stamped artifact file name for a folder: `<folder>_<YYYYMMDD_HHMMSS>.pdf`.
pub fn artifact_name(dir: &Path, at: DateTime<Local>) -> String {
    let folder = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    format!("{}_{}.pdf", folder, at.format("%Y%m%d_%H%M%S"))
}

/// Merger that shells out to a Ghostscript-compatible executable.
pub struct ExternalPdfMerger {
    config: MergerConfig,
}

impl ExternalPdfMerger {
    pub fn new(config: MergerConfig) -> Self {
        Self { config }
    }

    /// Builds the merge tool arguments.
    fn build_args(&self, output: &Path, inputs: &[PathBuf]) -> Vec<String> {
        let mut args = vec![
            "-dBATCH".to_string(),
            "-dNOPAUSE".to_string(),
            "-q".to_string(),
            "-sDEVICE=pdfwrite".to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args.push(format!("-sOutputFile={}", output.display()));
        args.extend(inputs.iter().map(|p| p.to_string_lossy().to_string()));
        args
    }

    async fn run_tool(&self, output: &Path, inputs: &[PathBuf]) -> Result<(), MergeError> {
        let args = self.build_args(output, inputs);
        debug!(
            program = %self.config.executable.display(),
            inputs = inputs.len(),
            output = %output.display(),
            "Running merge tool"
        );

        let child = Command::new(&self.config.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MergeError::ExecutableNotFound {
                        path: self.config.executable.clone(),
                    }
                } else {
                    MergeError::Io(e)
                }
            })?;

        let output_result = match timeout(self.config.timeout(), child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(MergeError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        };

        if !output_result.status.success() {
            return Err(MergeError::tool_failed(
                output_result.status.code(),
                &String::from_utf8_lossy(&output_result.stderr),
            ));
        }

        if fs::metadata(output).await.is_err() {
            return Err(MergeError::MissingOutput {
                path: output.to_path_buf(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ArtifactMerger for ExternalPdfMerger {
    fn name(&self) -> &str {
        "external-pdf"
    }

    async fn merge(&self, dir: &Path) -> Result<PathBuf, MergeError> {
        let inputs = list_pdfs(dir).await?;
        let output = dir.join(artifact_name(dir, Local::now()));

        match inputs.as_slice() {
            [] => Err(MergeError::NoInputs {
                dir: dir.to_path_buf(),
            }),
            [single] => {
                fs::rename(single, &output).await?;
                info!(
                    source = %single.display(),
                    artifact = %output.display(),
                    "Single report renamed"
                );
                Ok(output)
            }
            _ => {
                if let Err(e) = self.run_tool(&output, &inputs).await {
                    if fs::remove_file(&output).await.is_ok() {
                        debug!(output = %output.display(), "Removed partial merge output");
                    }
                    return Err(e);
                }

                for input in inputs.iter().filter(|p| **p != output) {
                    if let Err(e) = fs::remove_file(input).await {
                        warn!(file = %input.display(), error = %e, "Failed to remove merged source");
                    }
                }

                info!(
                    inputs = inputs.len(),
                    artifact = %output.display(),
                    "Reports merged"
                );
                Ok(output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            artifact_name(Path::new("/out/R-17"), at),
            "R-17_20240309_070501.pdf"
        );
    }

    #[test]
    fn test_build_args_layout() {
        let mut config = MergerConfig::new("gs");
        config.extra_args = vec!["-dPDFSETTINGS=/ebook".to_string()];
        let merger = ExternalPdfMerger::new(config);

        let args = merger.build_args(
            Path::new("/out/R1/R1_x.pdf"),
            &[PathBuf::from("/out/R1/a.pdf"), PathBuf::from("/out/R1/b.pdf")],
        );
        assert_eq!(
            args,
            vec![
                "-dBATCH",
                "-dNOPAUSE",
                "-q",
                "-sDEVICE=pdfwrite",
                "-dPDFSETTINGS=/ebook",
                "-sOutputFile=/out/R1/R1_x.pdf",
                "/out/R1/a.pdf",
                "/out/R1/b.pdf",
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_inputs_leaves_directory_untouched() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();
        let merger = ExternalPdfMerger::new(MergerConfig::new(dir.path().join("missing-tool")));

        let err = merger.merge(dir.path()).await.unwrap_err();
        assert!(matches!(err, MergeError::NoInputs { .. }));

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["notes.txt"]);
    }

    #[tokio::test]
    async fn test_single_input_is_renamed_without_tool() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("R1");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("CBC.pdf"), b"%PDF-cbc").unwrap();

        // Invoking the tool would fail with ExecutableNotFound
        let merger = ExternalPdfMerger::new(MergerConfig::new(dir.path().join("missing-tool")));
        let artifact = merger.merge(&folder).await.unwrap();

        let name = artifact.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("R1_"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(std::fs::read(&artifact).unwrap(), b"%PDF-cbc");
        assert!(!folder.join("CBC.pdf").exists());
    }

    #[cfg(unix)]
    mod external {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn write_tool(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("merge-tool.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        const CONCAT_TOOL: &str = r#"out=""
for a in "$@"; do
  case "$a" in
    -sOutputFile=*) out="${a#-sOutputFile=}" ;;
    -*) ;;
    *) cat "$a" >> "$out" ;;
  esac
done"#;

        fn folder_with(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
            let folder = dir.join("R1");
            std::fs::create_dir(&folder).unwrap();
            for (name, body) in files {
                std::fs::write(folder.join(name), body).unwrap();
            }
            folder
        }

        #[tokio::test]
        async fn test_multiple_inputs_are_merged_in_name_order() {
            let dir = TempDir::new().unwrap();
            let tool = write_tool(dir.path(), CONCAT_TOOL);
            let folder = folder_with(dir.path(), &[("b.pdf", "B"), ("a.pdf", "A"), ("c.pdf", "C")]);

            let merger = ExternalPdfMerger::new(MergerConfig::new(tool));
            let artifact = merger.merge(&folder).await.unwrap();

            assert_eq!(std::fs::read_to_string(&artifact).unwrap(), "ABC");
            let remaining = list_pdfs(&folder).await.unwrap();
            assert_eq!(remaining, vec![artifact]);
        }

        #[tokio::test]
        async fn test_tool_failure_keeps_sources_and_removes_partial_output() {
            let dir = TempDir::new().unwrap();
            let tool = write_tool(
                dir.path(),
                r#"for a in "$@"; do
  case "$a" in
    -sOutputFile=*) echo partial > "${a#-sOutputFile=}" ;;
  esac
done
echo 'broken xref' >&2
exit 1"#,
            );
            let folder = folder_with(dir.path(), &[("a.pdf", "A"), ("b.pdf", "B")]);

            let merger = ExternalPdfMerger::new(MergerConfig::new(tool));
            let err = merger.merge(&folder).await.unwrap_err();
            match err {
                MergeError::ToolFailed { exit_code, stderr } => {
                    assert_eq!(exit_code, Some(1));
                    assert_eq!(stderr.as_deref(), Some("broken xref"));
                }
                other => panic!("unexpected error: {other:?}"),
            }

            let remaining = list_pdfs(&folder).await.unwrap();
            assert_eq!(remaining, vec![folder.join("a.pdf"), folder.join("b.pdf")]);
        }

        #[tokio::test]
        async fn test_tool_without_output_is_an_error() {
            let dir = TempDir::new().unwrap();
            let tool = write_tool(dir.path(), "exit 0");
            let folder = folder_with(dir.path(), &[("a.pdf", "A"), ("b.pdf", "B")]);

            let merger = ExternalPdfMerger::new(MergerConfig::new(tool));
            let err = merger.merge(&folder).await.unwrap_err();
            assert!(matches!(err, MergeError::MissingOutput { .. }));
            assert_eq!(list_pdfs(&folder).await.unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_tool_timeout() {
            let dir = TempDir::new().unwrap();
            let tool = write_tool(dir.path(), "sleep 30");
            let folder = folder_with(dir.path(), &[("a.pdf", "A"), ("b.pdf", "B")]);

            let merger = ExternalPdfMerger::new(MergerConfig::new(tool).with_timeout_secs(1));
            let err = merger.merge(&folder).await.unwrap_err();
            assert!(matches!(err, MergeError::Timeout { timeout_secs: 1 }));
            assert_eq!(list_pdfs(&folder).await.unwrap().len(), 2);
        }
    }
}
