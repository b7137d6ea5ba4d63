//! Built-in tools: filesystem, version control, and run control.

mod file;
mod git;
mod task;

use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;

pub use file::{ListFilesTool, ReadFileTool, WriteFileTool};
pub use git::{
    GitAddTool, GitCommitTool, GitCreateBranchTool, GitDiffTool, GitLogTool, GitPushTool,
    GitStatusTool,
};
pub use task::{FinishTaskTool, LogThoughtTool, FINISH_TASK, LOG_THOUGHT};

use crate::tools::registry::ToolRegistry;

/// Register every built-in tool against the given working directory.
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    workdir: &Path,
    push_token: Option<SecretString>,
) {
    let workdir = workdir.to_path_buf();

    registry.register(Arc::new(ReadFileTool::new(workdir.clone())));
    registry.register(Arc::new(WriteFileTool::new(workdir.clone())));
    registry.register(Arc::new(ListFilesTool::new(workdir.clone())));

    registry.register(Arc::new(GitStatusTool::new(workdir.clone())));
    registry.register(Arc::new(GitDiffTool::new(workdir.clone())));
    registry.register(Arc::new(GitLogTool::new(workdir.clone())));
    registry.register(Arc::new(GitAddTool::new(workdir.clone())));
    registry.register(Arc::new(GitCommitTool::new(workdir.clone())));
    registry.register(Arc::new(GitCreateBranchTool::new(workdir.clone())));
    registry.register(Arc::new(GitPushTool::new(workdir, push_token)));

    registry.register(Arc::new(LogThoughtTool));
    registry.register(Arc::new(FinishTaskTool));

    tracing::info!(count = registry.list().len(), "registered built-in tools");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtins_register() {
        let mut registry = ToolRegistry::new(16 * 1024);
        register_builtin_tools(&mut registry, Path::new("."), None);

        for name in [
            "read_file",
            "write_file",
            "list_files",
            "git_status",
            "git_diff",
            "git_log",
            "git_add",
            "git_commit",
            "git_create_branch",
            "git_push",
            LOG_THOUGHT,
            FINISH_TASK,
        ] {
            assert!(registry.has(name), "missing builtin: {}", name);
        }
    }
}
