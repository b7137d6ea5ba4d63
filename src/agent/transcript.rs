//! The per-run conversation transcript.
//!
//! Append-only. Exactly one system instruction, first. Every tool-call
//! request is paired with exactly one tool-result message, appended in
//! the same order the requests were dispatched, before the next model
//! call is issued.

use std::collections::VecDeque;

use crate::llm::{ChatMessage, Role, ToolCallRequest};
use crate::tools::ToolResult;

/// Ordered message history of one ticket's run.
///
/// Owned by a single execution loop; dropped when the run ends.
#[derive(Debug)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    /// Call ids awaiting their result, in dispatch order.
    pending: VecDeque<String>,
}

impl Transcript {
    /// Start a transcript with the specialist's system instruction.
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_instruction)],
            pending: VecDeque::new(),
        }
    }

    /// Append the ticket context as the opening user message.
    pub fn push_context(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Append a synthetic corrective message (user role).
    pub fn push_corrective(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Append a plain-text model response.
    pub fn push_model_text(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Append a model response that requested tool calls.
    pub fn push_tool_calls(&mut self, calls: &[ToolCallRequest]) {
        for call in calls {
            self.pending.push_back(call.id.clone());
        }
        self.messages
            .push(ChatMessage::assistant_tool_calls(String::new(), calls.to_vec()));
    }

    /// Append a tool result, consuming the oldest pending call id.
    ///
    /// The loop dispatches strictly in request order, so the result must
    /// match the front of the pending queue; a mismatch is a bug in the
    /// caller and is logged, with the result appended regardless so the
    /// run record stays complete.
    pub fn push_tool_result(&mut self, result: &ToolResult) {
        match self.pending.front() {
            Some(front) if *front == result.call_id => {
                self.pending.pop_front();
            }
            other => {
                tracing::error!(
                    expected = ?other,
                    got = %result.call_id,
                    "tool result out of dispatch order"
                );
                self.pending.retain(|id| *id != result.call_id);
            }
        }
        self.messages
            .push(ChatMessage::tool_result(&result.call_id, &result.content));
    }

    /// Whether every dispatched call has its result and the next model
    /// call may be issued.
    pub fn ready_for_model(&self) -> bool {
        self.pending.is_empty()
    }

    /// Full message history, system instruction first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages, including the system instruction.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Count messages with the given role.
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: "read_file".to_string(),
            arguments: "{}".to_string(),
        }
    }

    fn result(id: &str) -> ToolResult {
        ToolResult {
            call_id: id.to_string(),
            success: true,
            content: "ok".to_string(),
        }
    }

    #[test]
    fn system_instruction_is_first() {
        let mut transcript = Transcript::new("be helpful");
        transcript.push_context("Ticket: do things");

        assert_eq!(transcript.messages()[0].role, Role::System);
        assert_eq!(transcript.messages()[0].content, "be helpful");
        assert_eq!(transcript.count_role(Role::System), 1);
    }

    #[test]
    fn results_follow_requests_in_dispatch_order() {
        let mut transcript = Transcript::new("sys");
        transcript.push_tool_calls(&[call("a"), call("b"), call("c")]);
        assert!(!transcript.ready_for_model());

        transcript.push_tool_result(&result("a"));
        transcript.push_tool_result(&result("b"));
        transcript.push_tool_result(&result("c"));
        assert!(transcript.ready_for_model());

        let ids: Vec<_> = transcript
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn out_of_order_result_still_clears_pending() {
        let mut transcript = Transcript::new("sys");
        transcript.push_tool_calls(&[call("a"), call("b")]);

        transcript.push_tool_result(&result("b"));
        transcript.push_tool_result(&result("a"));
        assert!(transcript.ready_for_model());
    }

    #[test]
    fn corrective_messages_are_user_role() {
        let mut transcript = Transcript::new("sys");
        transcript.push_context("ticket body");
        transcript.push_model_text("I think I will just talk.");
        transcript.push_corrective("Stop narrating. Call a tool.");

        assert_eq!(transcript.count_role(Role::User), 2);
        assert_eq!(transcript.count_role(Role::Assistant), 1);
    }
}
