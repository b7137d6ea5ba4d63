//! Tool registry: name → capability mapping and the dispatch step.
//!
//! Dispatch never throws across the loop boundary. Every outcome (an
//! unknown name, a disallowed tool, arguments the provider truncated, a
//! capability failure) comes back as a [`ToolResult`] the loop appends to
//! the transcript as data for the model to react to.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{ToolCallRequest, ToolDefinition};
use crate::tools::tool::{Tool, ToolError};

/// Marker appended to payloads cut down to the transcript size ceiling.
const TRUNCATION_MARKER: &str = "\n[... output truncated ...]";

/// Why a dispatch failed before or during execution.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Tool '{0}' is not allowed for this specialist")]
    ToolNotAllowed(String),

    #[error("Tool '{0}' is not registered")]
    ToolNotFound(String),

    #[error("Malformed tool arguments: {0}")]
    MalformedArguments(String),

    #[error(transparent)]
    Execution(#[from] ToolError),
}

/// Outcome of one tool dispatch, paired to its request by identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub success: bool,
    pub content: String,
}

impl ToolResult {
    fn ok(call_id: &str, content: String) -> Self {
        Self {
            call_id: call_id.to_string(),
            success: true,
            content,
        }
    }

    fn err(call_id: &str, error: &DispatchError) -> Self {
        Self {
            call_id: call_id.to_string(),
            success: false,
            content: format!("ERROR: {}", error),
        }
    }
}

/// Registry of available tools.
///
/// Built once at startup and shared read-only across concurrent runs.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    max_result_bytes: usize,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new(max_result_bytes: usize) -> Self {
        Self {
            tools: HashMap::new(),
            max_result_bytes,
        }
    }

    /// Register a tool. Last registration wins on a name collision.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        tracing::debug!(tool = %name, "registered tool");
        self.tools.insert(name, tool);
    }

    /// Check if a tool exists.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tool names.
    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Get tool definitions for the named tools, for LLM function calling.
    ///
    /// Names without a registered tool are skipped; the model never sees a
    /// definition it could not dispatch.
    pub fn definitions_for(&self, names: &[&str]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.tools.get(*name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// Dispatch a tool call on behalf of a specialist.
    ///
    /// The allowed set is enforced here, at dispatch time; the read-only
    /// guarantee of a profile does not depend on the model respecting its
    /// instructions.
    pub async fn dispatch(&self, call: &ToolCallRequest, allowed: &[&str]) -> ToolResult {
        match self.try_dispatch(call, allowed).await {
            Ok(content) => ToolResult::ok(&call.id, self.truncate(content)),
            Err(error) => {
                tracing::warn!(tool = %call.name, %error, "tool dispatch failed");
                ToolResult::err(&call.id, &error)
            }
        }
    }

    async fn try_dispatch(
        &self,
        call: &ToolCallRequest,
        allowed: &[&str],
    ) -> Result<String, DispatchError> {
        if !allowed.contains(&call.name.as_str()) {
            return Err(DispatchError::ToolNotAllowed(call.name.clone()));
        }

        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| DispatchError::ToolNotFound(call.name.clone()))?;

        let params = parse_arguments(&call.arguments, &tool.parameters_schema())?;

        tracing::info!(tool = %call.name, call_id = %call.id, "dispatching tool");
        let output = tool.execute(params).await?;

        let content = match output.result {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(content)
    }

    fn truncate(&self, mut content: String) -> String {
        if content.len() > self.max_result_bytes {
            let mut cut = self.max_result_bytes;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
            content.push_str(TRUNCATION_MARKER);
        }
        content
    }
}

/// Parse raw argument text against the tool's declared schema.
///
/// Fails closed: text that does not parse as a JSON object (a truncated
/// `write_file` payload, for instance) or that is missing a required
/// property is rejected before the tool ever runs.
fn parse_arguments(
    raw: &str,
    schema: &serde_json::Value,
) -> Result<serde_json::Value, DispatchError> {
    let trimmed = raw.trim();
    let value: serde_json::Value = if trimmed.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(trimmed)
            .map_err(|e| DispatchError::MalformedArguments(e.to_string()))?
    };

    let obj = value
        .as_object()
        .ok_or_else(|| DispatchError::MalformedArguments("arguments must be a JSON object".to_string()))?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !obj.contains_key(key) {
                return Err(DispatchError::MalformedArguments(format!(
                    "missing required property '{}'",
                    key
                )));
            }
        }
    }

    Ok(value)
}
