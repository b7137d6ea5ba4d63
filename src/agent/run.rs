//! The execution loop: one ticket, one specialist, one transcript.
//!
//! Drives repeated (model call → tool dispatch → transcript update) cycles
//! until the terminal tool fires or a hard ceiling is reached. The loop
//! suspends at exactly two points per cycle (the model call and the tool
//! dispatch) and nowhere else. Tool failures come back as data; only
//! loop-level failures end the run.

use std::sync::Arc;

use crate::agent::correction::{self, CorrectionStep};
use crate::agent::profile::profile_for;
use crate::agent::router;
use crate::agent::state::{AbortReason, CancellationHandle, RunPhase, RunResult, RunState};
use crate::agent::transcript::Transcript;
use crate::config::EngineConfig;
use crate::llm::{LlmProvider, ModelResponse};
use crate::tools::builtin::FINISH_TASK;
use crate::tools::ToolRegistry;
use crate::tracker::Ticket;

/// The agentic workflow engine.
///
/// Holds only shared read-only collaborators; every run owns its own
/// transcript and state, so one engine serves concurrent runs.
pub struct Engine {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: EngineConfig) -> Self {
        Self { llm, tools, config }
    }

    /// Execute one ticket to completion and return its outcome.
    pub async fn run_ticket(&self, ticket: &Ticket) -> RunResult {
        self.run_with_cancellation(ticket, CancellationHandle::new())
            .await
    }

    /// Execute one ticket with an external cancellation signal.
    ///
    /// Cancellation is honored between turns, never mid-dispatch.
    pub async fn run_with_cancellation(
        &self,
        ticket: &Ticket,
        cancel: CancellationHandle,
    ) -> RunResult {
        // The external environment must have materialized the repository.
        if !self.config.workdir.is_dir() {
            tracing::error!(
                ticket = %ticket.id,
                workdir = %self.config.workdir.display(),
                "workspace missing"
            );
            return RunResult::aborted(&ticket.id, AbortReason::WorkspaceMissing, 0);
        }

        let specialist = router::route(ticket);
        let profile = profile_for(specialist);

        let mut state = RunState::new();
        tracing::info!(
            ticket = %ticket.id,
            run_id = %state.run_id,
            specialist = %specialist,
            "routed ticket"
        );

        let tool_definitions = self.tools.definitions_for(profile.allowed_tools);
        let mut transcript = Transcript::new(profile.instructions);
        transcript.push_context(ticket_context_message(ticket));

        loop {
            state.phase = RunPhase::Thinking;

            if cancel.is_cancelled() {
                return self.abort(ticket, &mut state, AbortReason::Cancelled);
            }

            state.turns += 1;
            if state.turns >= self.config.max_turns {
                return self.abort(ticket, &mut state, AbortReason::TurnLimitExceeded);
            }

            debug_assert!(transcript.ready_for_model());
            let tool_choice = correction::tool_choice_for(state.escalation);
            let response = match self
                .llm
                .converse(transcript.messages(), &tool_definitions, tool_choice)
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    tracing::error!(ticket = %ticket.id, %error, "model gateway failed");
                    state.last_failure = Some(error.to_string());
                    return self.abort(ticket, &mut state, AbortReason::TransportFailure);
                }
            };

            match response {
                ModelResponse::ToolCalls(calls) => {
                    transcript.push_tool_calls(&calls);
                    state.phase = RunPhase::Dispatching;

                    for call in &calls {
                        let result = self.tools.dispatch(call, profile.allowed_tools).await;

                        if result.success && call.name == FINISH_TASK {
                            state.terminal_summary =
                                Some(summary_from_arguments(&call.arguments));
                        }
                        if !result.success {
                            state.last_failure = Some(result.content.clone());
                        }

                        state.phase = RunPhase::Observing;
                        transcript.push_tool_result(&result);
                    }

                    if let Some(summary) = state.terminal_summary.clone() {
                        state.phase = RunPhase::Terminated;
                        let elapsed = chrono::Utc::now().signed_duration_since(state.started_at);
                        tracing::info!(
                            ticket = %ticket.id,
                            run_id = %state.run_id,
                            turns = state.turns,
                            elapsed_secs = elapsed.num_seconds(),
                            "run terminated successfully"
                        );
                        return RunResult::success(&ticket.id, summary, state.turns);
                    }

                    // A dispatched tool call means progress; escalation
                    // starts over.
                    state.escalation = 0;
                }
                ModelResponse::Text(content) => {
                    state.phase = RunPhase::Correcting;
                    tracing::warn!(
                        ticket = %ticket.id,
                        turn = state.turns,
                        level = state.escalation,
                        "model narrated instead of acting"
                    );
                    transcript.push_model_text(content);

                    match correction::escalate(state.escalation) {
                        CorrectionStep::Retry { nudge } => {
                            transcript.push_corrective(nudge);
                            state.escalation += 1;
                        }
                        CorrectionStep::GiveUp => {
                            return self.abort(
                                ticket,
                                &mut state,
                                AbortReason::StalledAfterEscalation,
                            );
                        }
                    }
                }
            }
        }
    }

    fn abort(&self, ticket: &Ticket, state: &mut RunState, reason: AbortReason) -> RunResult {
        state.phase = RunPhase::Aborted;
        tracing::warn!(
            ticket = %ticket.id,
            run_id = %state.run_id,
            %reason,
            turns = state.turns,
            last_failure = state.last_failure.as_deref().unwrap_or(""),
            "run aborted"
        );
        RunResult::aborted(&ticket.id, reason, state.turns)
    }
}

/// Render the ticket as the opening user message.
fn ticket_context_message(ticket: &Ticket) -> String {
    let mut message = format!("Ticket #{}: {}\n\n{}", ticket.id, ticket.title, ticket.body);

    if let Some(context) = &ticket.context {
        if let Some(trace) = context.stack_trace.as_deref().filter(|t| !t.trim().is_empty()) {
            message.push_str("\n\nStack trace:\n");
            message.push_str(trace);
        }
        if !context.file_hints.is_empty() {
            message.push_str("\n\nRelevant files: ");
            message.push_str(&context.file_hints.join(", "));
        }
    }

    message
}

/// Pull the summary out of the terminal tool's arguments.
///
/// The arguments already passed the registry's schema check; this re-parse
/// only extracts the field.
fn summary_from_arguments(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| v.get("summary").and_then(|s| s.as_str()).map(String::from))
        .unwrap_or_else(|| "Task completed.".to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{ChatMessage, Role, ToolCallRequest, ToolChoice, ToolDefinition};
    use crate::tools::builtin::register_builtin_tools;
    use crate::tracker::TicketContext;

    /// Scripted model: plays back a fixed response sequence and records
    /// what the engine sent on each call.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
        choices: Mutex<Vec<ToolChoice>>,
        transcripts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<ModelResponse, LlmError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                choices: Mutex::new(Vec::new()),
                transcripts: Mutex::new(Vec::new()),
            }
        }

        fn choices(&self) -> Vec<ToolChoice> {
            self.choices.lock().unwrap().clone()
        }

        fn calls_made(&self) -> usize {
            self.choices.lock().unwrap().len()
        }

        fn transcript_at(&self, call: usize) -> Vec<ChatMessage> {
            self.transcripts.lock().unwrap()[call].clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn converse(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            tool_choice: ToolChoice,
        ) -> Result<ModelResponse, LlmError> {
            self.choices.lock().unwrap().push(tool_choice);
            self.transcripts.lock().unwrap().push(messages.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ModelResponse::Text(String::new())))
        }
    }

    fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn calls(list: Vec<ToolCallRequest>) -> Result<ModelResponse, LlmError> {
        Ok(ModelResponse::ToolCalls(list))
    }

    fn text(content: &str) -> Result<ModelResponse, LlmError> {
        Ok(ModelResponse::Text(content.to_string()))
    }

    fn engine(dir: &TempDir, provider: Arc<ScriptedProvider>, max_turns: u32) -> Engine {
        let mut registry = ToolRegistry::new(16 * 1024);
        register_builtin_tools(&mut registry, dir.path(), None);
        let config = EngineConfig {
            workdir: dir.path().to_path_buf(),
            max_turns,
            ..Default::default()
        };
        Engine::new(provider, Arc::new(registry), config)
    }

    fn ticket(id: &str, body: &str) -> Ticket {
        Ticket {
            id: id.to_string(),
            title: String::new(),
            body: body.to_string(),
            context: None,
        }
    }

    fn count_user_messages(messages: &[ChatMessage]) -> usize {
        messages.iter().filter(|m| m.role == Role::User).count()
    }

    #[tokio::test]
    async fn bugfix_scenario_runs_to_success() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.java"), "int x = y.getValue();").unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![
            calls(vec![tool_call(
                "c1",
                "read_file",
                serde_json::json!({"path": "main.java"}),
            )]),
            calls(vec![tool_call(
                "c2",
                "write_file",
                serde_json::json!({"path": "main.java", "content": "int x = y == null ? 0 : y.getValue();"}),
            )]),
            calls(vec![tool_call(
                "c3",
                FINISH_TASK,
                serde_json::json!({"summary": "Fixed null check"}),
            )]),
        ]));

        let engine = engine(&dir, provider.clone(), 50);
        let result = engine
            .run_ticket(&ticket("1", "NullPointerException at line 42"))
            .await;

        assert!(result.success);
        assert_eq!(result.summary.as_deref(), Some("Fixed null check"));
        assert_eq!(result.abort_reason, None);
        assert_eq!(result.turns, 3);
        assert_eq!(provider.calls_made(), 3);

        let patched = std::fs::read_to_string(dir.path().join("main.java")).unwrap();
        assert!(patched.contains("== null"));
    }

    #[tokio::test]
    async fn analyst_cannot_touch_the_filesystem() {
        let dir = TempDir::new().unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![
            calls(vec![tool_call(
                "c1",
                "write_file",
                serde_json::json!({"path": "hack.txt", "content": "x"}),
            )]),
            calls(vec![tool_call(
                "c2",
                FINISH_TASK,
                serde_json::json!({"summary": "The auth module has no glaring issues."}),
            )]),
        ]));

        let engine = engine(&dir, provider.clone(), 50);
        let result = engine
            .run_ticket(&ticket("2", "Review auth module for issues"))
            .await;

        // The denied dispatch is fed back as data; the run continues and
        // finishes via the terminal tool.
        assert!(result.success);
        assert_eq!(
            result.summary.as_deref(),
            Some("The auth module has no glaring issues.")
        );
        assert!(!dir.path().join("hack.txt").exists());

        // The second model call saw the failed tool result.
        let second = provider.transcript_at(1);
        let denial = second
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("tool result present");
        assert!(denial.content.contains("not allowed"));
    }

    #[tokio::test]
    async fn three_text_responses_stall_the_run() {
        let dir = TempDir::new().unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![
            text("Let me think about this."),
            text("I believe the fix is straightforward."),
            text("To summarize my plan..."),
        ]));

        let engine = engine(&dir, provider.clone(), 50);
        let result = engine.run_ticket(&ticket("3", "Add a widget")).await;

        assert!(!result.success);
        assert_eq!(result.abort_reason, Some(AbortReason::StalledAfterEscalation));
        // Exactly three model calls: levels 0 -> 1 -> 2 -> exceeded.
        assert_eq!(provider.calls_made(), 3);
        // Escalation drove the tool-choice modes: Auto, Auto, ForceAny.
        assert_eq!(
            provider.choices(),
            vec![ToolChoice::Auto, ToolChoice::Auto, ToolChoice::ForceAny]
        );
        // The third call saw both synthetic corrective messages on top of
        // the ticket context.
        assert_eq!(count_user_messages(&provider.transcript_at(2)), 3);
    }

    #[tokio::test]
    async fn escalation_resets_after_a_dispatch() {
        let dir = TempDir::new().unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![
            text("Narrating once."),
            calls(vec![tool_call(
                "c1",
                "log_thought",
                serde_json::json!({"thought": "back on track"}),
            )]),
            text("Narrating again."),
            text("And again."),
            text("And once more."),
        ]));

        let engine = engine(&dir, provider.clone(), 50);
        let result = engine.run_ticket(&ticket("4", "Add a widget")).await;

        assert!(!result.success);
        assert_eq!(result.abort_reason, Some(AbortReason::StalledAfterEscalation));
        // The dispatch in the middle reset the level, so the run survived
        // five model calls in total.
        assert_eq!(provider.calls_made(), 5);
        assert_eq!(
            provider.choices(),
            vec![
                ToolChoice::Auto,
                ToolChoice::Auto,
                ToolChoice::Auto,
                ToolChoice::Auto,
                ToolChoice::ForceAny,
            ]
        );
    }

    #[tokio::test]
    async fn turn_limit_aborts_on_the_nth_thinking_entry() {
        let dir = TempDir::new().unwrap();

        // Enough willing tool calls to run forever; the limit must stop it.
        let provider = Arc::new(ScriptedProvider::new(
            (0..10)
                .map(|i| {
                    calls(vec![tool_call(
                        &format!("c{}", i),
                        "log_thought",
                        serde_json::json!({"thought": "still going"}),
                    )])
                })
                .collect(),
        ));

        let engine = engine(&dir, provider.clone(), 3);
        let result = engine.run_ticket(&ticket("5", "Add a widget")).await;

        assert!(!result.success);
        assert_eq!(result.abort_reason, Some(AbortReason::TurnLimitExceeded));
        assert_eq!(result.turns, 3);
        // The third thinking entry aborted before issuing a model call.
        assert_eq!(provider.calls_made(), 2);
    }

    #[tokio::test]
    async fn turn_limit_applies_mid_escalation() {
        let dir = TempDir::new().unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![text("Stalling.")]));

        let engine = engine(&dir, provider.clone(), 2);
        let result = engine.run_ticket(&ticket("6", "Add a widget")).await;

        assert!(!result.success);
        assert_eq!(result.abort_reason, Some(AbortReason::TurnLimitExceeded));
        assert_eq!(result.turns, 2);
        assert_eq!(provider.calls_made(), 1);
    }

    #[tokio::test]
    async fn transport_failure_aborts_immediately() {
        let dir = TempDir::new().unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![Err(LlmError::Api {
            status: 500,
            message: "upstream down".to_string(),
        })]));

        let engine = engine(&dir, provider.clone(), 50);
        let result = engine.run_ticket(&ticket("7", "Add a widget")).await;

        assert!(!result.success);
        assert_eq!(result.abort_reason, Some(AbortReason::TransportFailure));
        assert_eq!(provider.calls_made(), 1);
    }

    #[tokio::test]
    async fn cancellation_is_checked_before_thinking() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let engine = engine(&dir, provider.clone(), 50);

        let cancel = CancellationHandle::new();
        cancel.cancel();

        let result = engine
            .run_with_cancellation(&ticket("8", "Add a widget"), cancel)
            .await;

        assert!(!result.success);
        assert_eq!(result.abort_reason, Some(AbortReason::Cancelled));
        assert_eq!(provider.calls_made(), 0);
    }

    #[tokio::test]
    async fn missing_workspace_fails_fast() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut registry = ToolRegistry::new(16 * 1024);
        register_builtin_tools(&mut registry, std::path::Path::new("."), None);
        let config = EngineConfig {
            workdir: std::path::PathBuf::from("/definitely/not/a/real/path"),
            ..Default::default()
        };
        let engine = Engine::new(provider.clone(), Arc::new(registry), config);

        let result = engine.run_ticket(&ticket("9", "Add a widget")).await;

        assert!(!result.success);
        assert_eq!(result.abort_reason, Some(AbortReason::WorkspaceMissing));
        assert_eq!(provider.calls_made(), 0);
    }

    #[tokio::test]
    async fn tool_results_keep_request_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![
            calls(vec![
                tool_call("c1", "read_file", serde_json::json!({"path": "a.txt"})),
                tool_call("c2", "read_file", serde_json::json!({"path": "b.txt"})),
                tool_call("c3", "log_thought", serde_json::json!({"thought": "ok"})),
            ]),
            calls(vec![tool_call(
                "c4",
                FINISH_TASK,
                serde_json::json!({"summary": "done"}),
            )]),
        ]));

        let engine = engine(&dir, provider.clone(), 50);
        let result = engine.run_ticket(&ticket("10", "Add a widget")).await;
        assert!(result.success);

        let second = provider.transcript_at(1);
        let result_ids: Vec<_> = second
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(result_ids, vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn malformed_terminal_arguments_do_not_terminate() {
        let dir = TempDir::new().unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![
            // Truncated arguments: the registry fails closed and the run
            // keeps going instead of finishing on partial data.
            calls(vec![tool_call_raw("c1", FINISH_TASK, "{\"summ")]),
            calls(vec![tool_call(
                "c2",
                FINISH_TASK,
                serde_json::json!({"summary": "done properly"}),
            )]),
        ]));

        let engine = engine(&dir, provider.clone(), 50);
        let result = engine.run_ticket(&ticket("11", "Add a widget")).await;

        assert!(result.success);
        assert_eq!(result.summary.as_deref(), Some("done properly"));
        assert_eq!(provider.calls_made(), 2);
    }

    #[tokio::test]
    async fn stack_trace_context_is_rendered() {
        let t = Ticket {
            id: "12".to_string(),
            title: "Crash on save".to_string(),
            body: "See trace".to_string(),
            context: Some(TicketContext {
                stack_trace: Some("at save() line 3".to_string()),
                file_hints: vec!["src/save.rs".to_string()],
            }),
        };
        let rendered = ticket_context_message(&t);
        assert!(rendered.contains("Ticket #12: Crash on save"));
        assert!(rendered.contains("at save() line 3"));
        assert!(rendered.contains("src/save.rs"));
    }

    #[test]
    fn summary_extraction_falls_back() {
        assert_eq!(
            summary_from_arguments(r#"{"summary": "all done"}"#),
            "all done"
        );
        assert_eq!(summary_from_arguments("{}"), "Task completed.");
        assert_eq!(summary_from_arguments("not json"), "Task completed.");
    }

    fn tool_call_raw(id: &str, name: &str, raw_arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: raw_arguments.to_string(),
        }
    }
}
