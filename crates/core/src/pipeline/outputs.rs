//! Filesystem handling of report outputs.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

/// Per-patient folder name for a registration key.
///
/// Characters other than ASCII alphanumerics, `-` and `_` become `_`.
pub fn folder_name(reg_key: &str) -> String {
    let name: String = reg_key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "_".to_string()
    } else {
        name
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Deletes top-level `*.pdf` files in `dir`. A missing directory is created.
///
/// Returns the number of files removed.
pub async fn cleanup_stale_outputs(dir: &Path) -> std::io::Result<usize> {
    if fs::metadata(dir).await.is_err() {
        fs::create_dir_all(dir).await?;
        return Ok(0);
    }

    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_pdf(&path) && entry.file_type().await?.is_file() {
            fs::remove_file(&path).await?;
            debug!(file = %path.display(), "Removed stale output");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Moves `files` (names inside `from`) into `folder`, creating it if needed.
///
/// Returns the new paths in the same order.
pub async fn move_into_folder(
    from: &Path,
    files: &[String],
    folder: &Path,
) -> std::io::Result<Vec<PathBuf>> {
    fs::create_dir_all(folder).await?;
    let mut moved = Vec::with_capacity(files.len());
    for name in files {
        let target = folder.join(name);
        fs::rename(from.join(name), &target).await?;
        moved.push(target);
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_folder_name_sanitizes() {
        assert_eq!(folder_name("R-2024_001"), "R-2024_001");
        assert_eq!(folder_name("R/2024 001"), "R_2024_001");
        assert_eq!(folder_name("../etc"), "___etc");
        assert_eq!(folder_name(""), "_");
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_top_level_pdfs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("OLD2.PDF"), b"x").unwrap();
        std::fs::write(dir.path().join(".courier.lock"), b"{}").unwrap();
        std::fs::create_dir(dir.path().join("R1")).unwrap();
        std::fs::write(dir.path().join("R1").join("kept.pdf"), b"x").unwrap();

        let removed = cleanup_stale_outputs(dir.path()).await.unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join(".courier.lock").exists());
        assert!(dir.path().join("R1").join("kept.pdf").exists());
    }

    #[tokio::test]
    async fn test_cleanup_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("R1");
        assert_eq!(cleanup_stale_outputs(&target).await.unwrap(), 0);
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_move_into_folder() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"A").unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"B").unwrap();

        let folder = dir.path().join("R1");
        let moved = move_into_folder(
            dir.path(),
            &["a.pdf".to_string(), "b.pdf".to_string()],
            &folder,
        )
        .await
        .unwrap();

        assert_eq!(moved, vec![folder.join("a.pdf"), folder.join("b.pdf")]);
        assert!(!dir.path().join("a.pdf").exists());
        assert_eq!(std::fs::read(folder.join("b.pdf")).unwrap(), b"B");
    }
}
