//! Error types shared across the crate.
//!
//! Tool-level failures live in `tools::tool::ToolError` and are always
//! folded into a `ToolResult` before they reach the execution loop. The
//! types here are the ones that can actually end a run or abort startup.

use thiserror::Error;

/// Error type for LLM provider operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Error type for the task-tracker client.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Tracker returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected tracker payload: {0}")]
    MalformedResponse(String),
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {message}")]
    InvalidVar { var: &'static str, message: String },
}

/// Error type for workspace bootstrapping.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Workspace directory missing: {0}")]
    Missing(std::path::PathBuf),

    #[error("Git clone failed: {0}")]
    CloneFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
