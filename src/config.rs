//! Environment-driven configuration.
//!
//! All settings come from environment variables (a `.env` file is honored
//! via `dotenvy`). Secrets are wrapped in [`SecretString`] so they never
//! appear in debug output or logs.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default ceiling on model output tokens per call.
///
/// Generous enough for full-file `write_file` arguments; anything the
/// provider truncates beyond this fails closed in the argument parser.
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Default hard ceiling on thinking cycles per run.
const DEFAULT_MAX_TURNS: u32 = 50;

/// Default ceiling on a single tool-result payload in the transcript.
const DEFAULT_MAX_TOOL_RESULT_BYTES: usize = 16 * 1024;

/// Default tracker polling interval.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub tracker: TrackerConfig,
    pub engine: EngineConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for the provider.
    pub api_key: SecretString,
    /// Model identifier.
    pub model: String,
    /// Base URL override (defaults to the hosted endpoint).
    pub base_url: Option<String>,
    /// Output token ceiling per call.
    pub max_output_tokens: u32,
}

/// Task-tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL of the tracker API.
    pub base_url: String,
    /// Agent account username.
    pub username: String,
    /// Agent account password.
    pub password: SecretString,
    /// Project whose tickets this agent works.
    pub project_id: String,
    /// Status a ticket is moved to after a successful run.
    pub review_status: String,
    /// Status a ticket is moved to after an aborted run.
    pub failed_status: String,
    /// How often the host binary polls for new tickets.
    pub poll_interval: Duration,
}

/// Execution engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Working directory holding the target repository.
    pub workdir: PathBuf,
    /// Repository to clone into the working directory when absent.
    pub repo_url: Option<String>,
    /// Token used by `git_push`; never exposed to the model.
    pub push_token: Option<SecretString>,
    /// Hard ceiling on thinking cycles per run.
    pub max_turns: u32,
    /// Ceiling on a single tool-result payload in the transcript.
    pub max_tool_result_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("work_dir"),
            repo_url: None,
            push_token: None,
            max_turns: DEFAULT_MAX_TURNS,
            max_tool_result_bytes: DEFAULT_MAX_TOOL_RESULT_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let llm = LlmConfig {
            api_key: SecretString::from(require("MISTRAL_API_KEY")?),
            model: optional("MISTRAL_MODEL").unwrap_or_else(|| "mistral-small-latest".to_string()),
            base_url: optional("MISTRAL_BASE_URL"),
            max_output_tokens: parse_or("LLM_MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS)?,
        };

        let tracker = TrackerConfig {
            base_url: require("TRACKER_BASE_URL")?,
            username: require("TRACKER_USERNAME")?,
            password: SecretString::from(require("TRACKER_PASSWORD")?),
            project_id: require("TRACKER_PROJECT_ID")?,
            review_status: optional("TRACKER_REVIEW_STATUS").unwrap_or_else(|| "review".to_string()),
            failed_status: optional("TRACKER_FAILED_STATUS").unwrap_or_else(|| "open".to_string()),
            poll_interval: Duration::from_secs(parse_or(
                "TRACKER_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
        };

        let engine = EngineConfig {
            workdir: PathBuf::from(optional("AGENT_WORKDIR").unwrap_or_else(|| "work_dir".to_string())),
            repo_url: optional("AGENT_REPO_URL"),
            push_token: optional("GITHUB_TOKEN").map(SecretString::from),
            max_turns: parse_or("AGENT_MAX_TURNS", DEFAULT_MAX_TURNS)?,
            max_tool_result_bytes: parse_or(
                "AGENT_MAX_TOOL_RESULT_BYTES",
                DEFAULT_MAX_TOOL_RESULT_BYTES,
            )?,
        };

        Ok(Self {
            llm,
            tracker,
            engine,
        })
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingVar(var))
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            var,
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults_are_sane() {
        let engine = EngineConfig::default();
        assert_eq!(engine.max_turns, DEFAULT_MAX_TURNS);
        assert!(engine.max_tool_result_bytes > 0);
        assert!(engine.push_token.is_none());
    }
}
