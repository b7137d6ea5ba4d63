//! Workspace bootstrapping.
//!
//! The engine assumes the target repository already exists at the working
//! path and fails fast when it does not. This module is the host-side
//! helper that establishes the precondition before any run starts.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::WorkspaceError;

/// Whether the working directory holds a git repository.
pub fn is_repository(workdir: &Path) -> bool {
    workdir.join(".git").is_dir()
}

/// Make sure `workdir` holds a repository, cloning `repo_url` when absent.
///
/// Falls back to `git init` when the clone fails, so a not-yet-existing
/// remote still yields a usable workspace.
pub async fn ensure_repository(workdir: &Path, repo_url: Option<&str>) -> Result<(), WorkspaceError> {
    if !workdir.exists() {
        tokio::fs::create_dir_all(workdir).await?;
    }

    if is_repository(workdir) {
        tracing::info!(workdir = %workdir.display(), "repository already present");
        return Ok(());
    }

    if let Some(url) = repo_url {
        tracing::info!(%url, "cloning repository into workspace");
        let output = Command::new("git")
            .args(["clone", url, "."])
            .current_dir(workdir)
            .stdin(Stdio::null())
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }
        tracing::warn!(
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "clone failed, falling back to git init"
        );
    }

    let output = Command::new("git")
        .args(["init"])
        .current_dir(workdir)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(WorkspaceError::CloneFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn ensure_repository_initializes_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(!is_repository(dir.path()));

        ensure_repository(dir.path(), None).await.unwrap();
        assert!(is_repository(dir.path()));
    }

    #[tokio::test]
    async fn ensure_repository_is_idempotent() {
        let dir = TempDir::new().unwrap();
        ensure_repository(dir.path(), None).await.unwrap();
        ensure_repository(dir.path(), None).await.unwrap();
        assert!(is_repository(dir.path()));
    }

    #[tokio::test]
    async fn ensure_repository_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("work/repo");

        ensure_repository(&nested, None).await.unwrap();
        assert!(is_repository(&nested));
    }
}
