//! Version-control tools backed by the `git` binary.
//!
//! Each capability is a registry entry with a fixed argument schema; the
//! engine treats them as opaque. `git_push` is the only one that touches
//! credentials: the token comes from process configuration and is scrubbed
//! from anything the model gets to see.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;

use crate::tools::tool::{Tool, ToolError, ToolOutput};

/// Maximum captured output per git invocation (64KB).
const MAX_OUTPUT_SIZE: usize = 64 * 1024;

/// Git command timeout.
const GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Run a git subcommand in `workdir` and capture its output.
async fn run_git(workdir: &Path, args: &[&str]) -> Result<String, ToolError> {
    let output = tokio::time::timeout(
        GIT_TIMEOUT,
        Command::new("git")
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .output(),
    )
    .await
    .map_err(|_| ToolError::Timeout(GIT_TIMEOUT))?
    .map_err(|e| ToolError::ExecutionFailed(format!("Failed to spawn git: {}", e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        return Err(ToolError::ExecutionFailed(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            truncate(stderr.trim())
        )));
    }

    let combined = if stdout.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        stdout.trim().to_string()
    };
    Ok(truncate(&combined))
}

fn truncate(s: &str) -> String {
    if s.len() > MAX_OUTPUT_SIZE {
        let mut cut = MAX_OUTPUT_SIZE;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}\n[... output truncated ...]", &s[..cut])
    } else {
        s.to_string()
    }
}

fn no_params_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

/// Working-tree status.
#[derive(Debug)]
pub struct GitStatusTool {
    workdir: PathBuf,
}

impl GitStatusTool {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }

    fn description(&self) -> &str {
        "Show the git working-tree status (changed, staged and untracked files)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        no_params_schema()
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let out = run_git(&self.workdir, &["status", "--short", "--branch"]).await?;
        let text = if out.is_empty() {
            "(clean working tree)".to_string()
        } else {
            out
        };
        Ok(ToolOutput::text(text, start.elapsed()))
    }
}

/// Diff of working tree or staged changes.
#[derive(Debug)]
pub struct GitDiffTool {
    workdir: PathBuf,
}

impl GitDiffTool {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &str {
        "git_diff"
    }

    fn description(&self) -> &str {
        "Show uncommitted changes as a unified diff. Optionally limit to one \
         path, or show staged changes instead of the working tree."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Limit the diff to this path (optional)"
                },
                "staged": {
                    "type": "boolean",
                    "description": "Diff the index instead of the working tree (default false)"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();

        let mut args = vec!["diff"];
        if params.get("staged").and_then(|v| v.as_bool()).unwrap_or(false) {
            args.push("--cached");
        }
        let path = params.get("path").and_then(|v| v.as_str());
        if let Some(p) = path {
            args.push("--");
            args.push(p);
        }

        let out = run_git(&self.workdir, &args).await?;
        let text = if out.is_empty() {
            "(no changes)".to_string()
        } else {
            out
        };
        Ok(ToolOutput::text(text, start.elapsed()))
    }
}

/// Recent commit history.
#[derive(Debug)]
pub struct GitLogTool {
    workdir: PathBuf,
}

impl GitLogTool {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for GitLogTool {
    fn name(&self) -> &str {
        "git_log"
    }

    fn description(&self) -> &str {
        "Show recent commit history, one line per commit."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "max_count": {
                    "type": "integer",
                    "description": "Number of commits to show (default 20)"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let max = params
            .get("max_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(20)
            .clamp(1, 200);
        let count = format!("-{}", max);
        let out = run_git(&self.workdir, &["log", "--oneline", &count]).await?;
        let text = if out.is_empty() {
            "(no commits yet)".to_string()
        } else {
            out
        };
        Ok(ToolOutput::text(text, start.elapsed()))
    }
}

/// Stage files.
#[derive(Debug)]
pub struct GitAddTool {
    workdir: PathBuf,
}

impl GitAddTool {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for GitAddTool {
    fn name(&self) -> &str {
        "git_add"
    }

    fn description(&self) -> &str {
        "Stage files for commit. Pass ['.'] to stage everything."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Paths to stage, relative to the repository root"
                }
            },
            "required": ["paths"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let paths: Vec<String> = params
            .get("paths")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .ok_or_else(|| ToolError::InvalidParameters("missing 'paths' parameter".into()))?;

        if paths.is_empty() {
            return Err(ToolError::InvalidParameters(
                "'paths' must not be empty".into(),
            ));
        }

        let start = std::time::Instant::now();
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(|s| s.as_str()));
        run_git(&self.workdir, &args).await?;

        Ok(ToolOutput::text(
            format!("Staged {} path(s).", paths.len()),
            start.elapsed(),
        ))
    }
}

/// Commit staged changes.
#[derive(Debug)]
pub struct GitCommitTool {
    workdir: PathBuf,
}

impl GitCommitTool {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for GitCommitTool {
    fn name(&self) -> &str {
        "git_commit"
    }

    fn description(&self) -> &str {
        "Commit the staged changes with the given message."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Commit message"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let message = params
            .get("message")
            .and_then(|v| v.as_str())
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'message' parameter".into()))?;

        let start = std::time::Instant::now();
        let out = run_git(&self.workdir, &["commit", "-m", message]).await?;
        Ok(ToolOutput::text(out, start.elapsed()))
    }
}

/// Create and switch to a new branch.
#[derive(Debug)]
pub struct GitCreateBranchTool {
    workdir: PathBuf,
}

impl GitCreateBranchTool {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for GitCreateBranchTool {
    fn name(&self) -> &str {
        "git_create_branch"
    }

    fn description(&self) -> &str {
        "Create a new git branch and switch to it immediately. \
         Example names: 'feature/login-page', 'fix/bug-123'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "branch_name": {
                    "type": "string",
                    "description": "Name of the branch to create"
                }
            },
            "required": ["branch_name"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let branch = params
            .get("branch_name")
            .and_then(|v| v.as_str())
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'branch_name' parameter".into()))?;

        let start = std::time::Instant::now();
        run_git(&self.workdir, &["checkout", "-b", branch]).await?;
        Ok(ToolOutput::text(
            format!("Created and switched to branch '{}'.", branch),
            start.elapsed(),
        ))
    }
}

/// Push the current branch to origin.
///
/// The authentication token is injected from process configuration, never
/// supplied by the model, and scrubbed from any output before it reaches
/// the transcript.
pub struct GitPushTool {
    workdir: PathBuf,
    token: Option<SecretString>,
}

impl std::fmt::Debug for GitPushTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitPushTool")
            .field("workdir", &self.workdir)
            .field("token", &self.token.is_some())
            .finish()
    }
}

impl GitPushTool {
    pub fn new(workdir: PathBuf, token: Option<SecretString>) -> Self {
        Self { workdir, token }
    }

    fn scrub(&self, text: &str) -> String {
        match &self.token {
            Some(token) => text.replace(token.expose_secret(), "***"),
            None => text.to_string(),
        }
    }
}

#[async_trait]
impl Tool for GitPushTool {
    fn name(&self) -> &str {
        "git_push"
    }

    fn description(&self) -> &str {
        "Push the current branch to the remote repository, setting the \
         upstream automatically."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        no_params_schema()
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| ToolError::NotAuthorized("no push token configured".into()))?;

        let start = std::time::Instant::now();

        let remote = run_git(&self.workdir, &["remote", "get-url", "origin"]).await?;
        if remote.starts_with("https://") && !remote.contains('@') {
            let auth_url = remote.replace(
                "https://",
                &format!("https://{}@", token.expose_secret()),
            );
            run_git(&self.workdir, &["remote", "set-url", "origin", &auth_url])
                .await
                .map_err(|e| ToolError::ExecutionFailed(self.scrub(&e.to_string())))?;
        }

        match run_git(&self.workdir, &["push", "-u", "origin", "HEAD"]).await {
            Ok(out) => Ok(ToolOutput::text(
                format!("Push successful.\n{}", self.scrub(&out)),
                start.elapsed(),
            )),
            Err(e) => Err(ToolError::ExecutionFailed(self.scrub(&e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn init_repo(dir: &TempDir) {
        run_git(dir.path(), &["init", "-b", "main"])
            .await
            .unwrap();
        run_git(
            dir.path(),
            &["config", "user.email", "agent@example.com"],
        )
        .await
        .unwrap();
        run_git(dir.path(), &["config", "user.name", "agent"])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn status_on_clean_repo() {
        let dir = TempDir::new().unwrap();
        init_repo(&dir).await;

        let tool = GitStatusTool::new(dir.path().to_path_buf());
        let out = tool.execute(serde_json::json!({})).await.unwrap();
        let text = out.result.as_str().unwrap();
        assert!(text.contains("main") || text.contains("No commits"));
    }

    #[tokio::test]
    async fn add_and_commit_round() {
        let dir = TempDir::new().unwrap();
        init_repo(&dir).await;
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let add = GitAddTool::new(dir.path().to_path_buf());
        add.execute(serde_json::json!({"paths": ["a.txt"]}))
            .await
            .unwrap();

        let commit = GitCommitTool::new(dir.path().to_path_buf());
        let out = commit
            .execute(serde_json::json!({"message": "add a.txt"}))
            .await
            .unwrap();
        assert!(out.result.as_str().unwrap().contains("a.txt"));

        let log = GitLogTool::new(dir.path().to_path_buf());
        let out = log.execute(serde_json::json!({})).await.unwrap();
        assert!(out.result.as_str().unwrap().contains("add a.txt"));
    }

    #[tokio::test]
    async fn create_branch_switches() {
        let dir = TempDir::new().unwrap();
        init_repo(&dir).await;
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let add = GitAddTool::new(dir.path().to_path_buf());
        add.execute(serde_json::json!({"paths": ["."]})).await.unwrap();
        let commit = GitCommitTool::new(dir.path().to_path_buf());
        commit
            .execute(serde_json::json!({"message": "init"}))
            .await
            .unwrap();

        let tool = GitCreateBranchTool::new(dir.path().to_path_buf());
        tool.execute(serde_json::json!({"branch_name": "fix/bug-1"}))
            .await
            .unwrap();

        let status = run_git(dir.path(), &["branch", "--show-current"])
            .await
            .unwrap();
        assert_eq!(status, "fix/bug-1");
    }

    #[tokio::test]
    async fn push_without_token_is_not_authorized() {
        let dir = TempDir::new().unwrap();
        init_repo(&dir).await;

        let tool = GitPushTool::new(dir.path().to_path_buf(), None);
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn commit_requires_message() {
        let dir = TempDir::new().unwrap();
        init_repo(&dir).await;

        let tool = GitCommitTool::new(dir.path().to_path_buf());
        let err = tool
            .execute(serde_json::json!({"message": "  "}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }
}
