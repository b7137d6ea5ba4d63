//! Run-control tools available to every specialist.

use async_trait::async_trait;

use crate::tools::tool::{Tool, ToolError, ToolOutput};

/// Name of the terminal tool. Dispatching it ends the run successfully.
pub const FINISH_TASK: &str = "finish_task";

/// Name of the planning tool.
pub const LOG_THOUGHT: &str = "log_thought";

/// Terminal tool: the model calls this when the ticket is done.
///
/// Execution only acknowledges; the loop observes the dispatch and flips
/// the run's terminal flag, capturing the summary from the arguments.
#[derive(Debug, Default)]
pub struct FinishTaskTool;

#[async_trait]
impl Tool for FinishTaskTool {
    fn name(&self) -> &str {
        FINISH_TASK
    }

    fn description(&self) -> &str {
        "Call this tool when you have completed the task. Provide a detailed \
         summary of the changes you made."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Summary of what was done"
                }
            },
            "required": ["summary"]
        })
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::text(
            "Task marked as finished.",
            std::time::Duration::from_millis(0),
        ))
    }
}

/// Planning tool: lets the model think out loud without breaking the
/// tool-calling workflow.
#[derive(Debug, Default)]
pub struct LogThoughtTool;

#[async_trait]
impl Tool for LogThoughtTool {
    fn name(&self) -> &str {
        LOG_THOUGHT
    }

    fn description(&self) -> &str {
        "Record a thought or observation. Use this to plan your next step \
         without producing chat output."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "thought": {
                    "type": "string",
                    "description": "The thought to record"
                }
            },
            "required": ["thought"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let thought = params
            .get("thought")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'thought' parameter".into()))?;

        tracing::info!(thought = %thought, "agent thought");

        Ok(ToolOutput::text(
            "Thought recorded. Proceed with the next tool.",
            std::time::Duration::from_millis(0),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finish_task_acknowledges() {
        let tool = FinishTaskTool;
        let out = tool
            .execute(serde_json::json!({"summary": "Fixed null check"}))
            .await
            .unwrap();
        assert_eq!(out.result, serde_json::json!("Task marked as finished."));
    }

    #[tokio::test]
    async fn log_thought_requires_text() {
        let tool = LogThoughtTool;
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }
}
