//! LLM integration: the model gateway.
//!
//! One synchronous call abstraction over an external tool-calling model.
//! Retry and escalation live a layer above, in the self-correction
//! controller; this layer only enforces the output-size ceiling and maps
//! the wire format into a discriminated [`ModelResponse`].

mod mistral;
mod provider;

pub use mistral::MistralProvider;
pub use provider::{
    sanitize_tool_calls, ChatMessage, LlmProvider, ModelResponse, Role, ToolCallRequest,
    ToolChoice, ToolDefinition,
};

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Create an LLM provider based on configuration.
pub fn create_llm_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    tracing::info!(model = %config.model, "using Mistral chat-completions API");
    Ok(Arc::new(MistralProvider::new(config.clone())))
}
