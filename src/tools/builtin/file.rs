//! File operation tools for reading, writing, and navigating the working
//! directory.
//!
//! All paths are confined to the run's working directory; traversal out of
//! it is rejected at validation time, and sizes are bounded on both reads
//! and writes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::tools::tool::{Tool, ToolError, ToolOutput};

/// Maximum file size for reading (1MB).
const MAX_READ_SIZE: u64 = 1024 * 1024;

/// Maximum file size for writing (5MB).
const MAX_WRITE_SIZE: usize = 5 * 1024 * 1024;

/// Maximum directory listing entries.
const MAX_DIR_ENTRIES: usize = 500;

/// Directories never surfaced in listings.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__", ".venv"];

/// Resolve `path_str` inside `base_dir`, rejecting escapes.
fn validate_path(path_str: &str, base_dir: &Path) -> Result<PathBuf, ToolError> {
    // Leading slashes would make join() ignore the base.
    let clean = path_str.trim_start_matches('/');
    let joined = base_dir.join(clean);

    let base_canonical = base_dir
        .canonicalize()
        .map_err(|e| ToolError::ExecutionFailed(format!("Cannot resolve workdir: {}", e)))?;

    // Files being created do not canonicalize; check the nearest existing
    // ancestor instead.
    let check_path = if joined.exists() {
        joined.canonicalize().unwrap_or_else(|_| joined.clone())
    } else if let Some(parent) = joined.parent() {
        let canonical_parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
        match joined.file_name() {
            Some(name) => canonical_parent.join(name),
            None => joined.clone(),
        }
    } else {
        joined.clone()
    };

    if !check_path.starts_with(&base_canonical) {
        return Err(ToolError::NotAuthorized(format!(
            "Path escapes working directory: {}",
            path_str
        )));
    }

    Ok(joined)
}

/// Read file contents tool.
#[derive(Debug)]
pub struct ReadFileTool {
    workdir: PathBuf,
}

impl ReadFileTool {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the content of a file in the working repository. \
         Returns the file text, or an error if the file does not exist."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the repository root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path_str = params
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'path' parameter".into()))?;

        let start = std::time::Instant::now();
        let path = validate_path(path_str, &self.workdir)?;

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Cannot access '{}': {}", path_str, e)))?;

        if metadata.len() > MAX_READ_SIZE {
            return Err(ToolError::ExecutionFailed(format!(
                "File too large ({} bytes). Maximum is {} bytes.",
                metadata.len(),
                MAX_READ_SIZE
            )));
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read file: {}", e)))?;

        if content.is_empty() {
            return Ok(ToolOutput::text("(file is empty)", start.elapsed()));
        }

        Ok(ToolOutput::text(content, start.elapsed()))
    }
}

/// Write file contents tool.
#[derive(Debug)]
pub struct WriteFileTool {
    workdir: PathBuf,
}

impl WriteFileTool {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the working repository. Creates the file \
         if it doesn't exist, overwrites if it does. Parent directories are \
         created automatically."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the repository root"
                },
                "content": {
                    "type": "string",
                    "description": "Full content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path_str = params
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'path' parameter".into()))?;

        let content = params
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'content' parameter".into()))?;

        if content.len() > MAX_WRITE_SIZE {
            return Err(ToolError::InvalidParameters(format!(
                "Content too large ({} bytes). Maximum is {} bytes.",
                content.len(),
                MAX_WRITE_SIZE
            )));
        }

        let start = std::time::Instant::now();
        let path = validate_path(path_str, &self.workdir)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ToolError::ExecutionFailed(format!("Failed to create directories: {}", e))
            })?;
        }

        fs::write(&path, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to write file: {}", e)))?;

        Ok(ToolOutput::text(
            format!("Wrote {} bytes to {}", content.len(), path_str),
            start.elapsed(),
        ))
    }
}

/// List files tool.
#[derive(Debug)]
pub struct ListFilesTool {
    workdir: PathBuf,
}

impl ListFilesTool {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files in the working repository, recursively. Version-control \
         metadata and build output directories are excluded."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory to list, relative to the repository root (defaults to the root)"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let dir_str = params
            .get("directory")
            .and_then(|v| v.as_str())
            .unwrap_or(".");

        let start = std::time::Instant::now();
        let dir = validate_path(dir_str, &self.workdir)?;

        let mut files = Vec::new();
        collect_files(&self.workdir, &dir, &mut files).await?;
        files.sort();

        let truncated = files.len() > MAX_DIR_ENTRIES;
        files.truncate(MAX_DIR_ENTRIES);

        let mut listing = if files.is_empty() {
            "No files found.".to_string()
        } else {
            files.join("\n")
        };
        if truncated {
            listing.push_str("\n(listing truncated)");
        }

        Ok(ToolOutput::text(listing, start.elapsed()))
    }
}

/// Recursively collect file paths relative to `base`.
async fn collect_files(
    base: &Path,
    dir: &Path,
    files: &mut Vec<String>,
) -> Result<(), ToolError> {
    if files.len() > MAX_DIR_ENTRIES {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read directory: {}", e)))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read entry: {}", e)))?
    {
        if files.len() > MAX_DIR_ENTRIES {
            break;
        }

        let path = entry.path();
        let name = entry.file_name();
        let name_str = name.to_string_lossy();

        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        if file_type.is_dir() {
            if SKIPPED_DIRS.contains(&name_str.as_ref()) {
                continue;
            }
            Box::pin(collect_files(base, &path, files)).await?;
        } else {
            let relative = path.strip_prefix(base).unwrap_or(&path);
            files.push(relative.to_string_lossy().to_string());
        }
    }

    Ok(())
}
