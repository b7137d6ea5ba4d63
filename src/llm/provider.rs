//! Provider-neutral types for the model gateway.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Role of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in the conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Set on `Tool` messages to pair the result with its request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on `Assistant` messages that requested tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// An assistant message carrying tool-call requests.
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Some(calls),
        }
    }

    /// A tool-result message paired to a specific call.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(call_id.into()),
            tool_calls: None,
        }
    }
}

/// A tool invocation requested by the model.
///
/// `arguments` is kept as the raw JSON text exactly as the provider sent it.
/// The registry parses it at dispatch time and fails closed on anything the
/// provider truncated or garbled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Definition of a tool exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// How the model is allowed to respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    /// The model may emit plain text or any tool call.
    #[default]
    Auto,
    /// The model must emit some tool call, chosen freely.
    ForceAny,
    /// Reserved: the model must call the named tool. Unused by the
    /// default escalation policy.
    #[allow(dead_code)]
    ForceSpecific(&'static str),
}

/// Response from one model call.
#[derive(Debug, Clone)]
pub enum ModelResponse {
    /// The model produced plain text instead of acting.
    Text(String),
    /// The model requested one or more tool calls.
    ToolCalls(Vec<ToolCallRequest>),
}

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the model name being used.
    fn model_name(&self) -> &str;

    /// One synchronous call: transcript and tool set in, text or tool
    /// calls out. No retries at this layer.
    async fn converse(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        tool_choice: ToolChoice,
    ) -> Result<ModelResponse, LlmError>;
}

/// Valid tool names are bare identifiers, as the tool APIs require.
static TOOL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,63}$").expect("valid regex"));

/// Drop hallucinated tool calls whose name is not a plausible identifier.
///
/// Some models emit whole sentences as the function name; forwarding those
/// upstream produces hard API errors. A call list emptied here degrades the
/// response to text, which routes it into the self-correction path.
pub fn sanitize_tool_calls(calls: Vec<ToolCallRequest>) -> Vec<ToolCallRequest> {
    calls
        .into_iter()
        .filter(|call| {
            let ok = TOOL_NAME_RE.is_match(&call.name);
            if !ok {
                tracing::warn!(name = %call.name, "dropping tool call with invalid name");
            }
            ok
        })
        .collect()
}
