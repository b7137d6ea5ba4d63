//! Self-correction policy for degenerate model output.
//!
//! Invoked whenever a thinking cycle ends in plain text instead of a tool
//! call. Escalation is keyed by the level accumulated since the last
//! successful dispatch; the transitions are enumerated here rather than
//! branched ad hoc in the loop.

use crate::llm::ToolChoice;

/// Escalation level after which the run gives up.
pub const MAX_ESCALATION: u8 = 2;

/// Appended at level 0 → 1. Tool choice stays `Auto`.
const NUDGE: &str = "Narration is not acceptable. You must invoke a tool to make \
     progress. Use 'log_thought' if you need to plan, then call the next tool.";

/// Appended at level 1 → 2. Tool choice switches to `ForceAny`.
const FINAL_NUDGE: &str = "STOP narrating. Your next response MUST be a tool call. Call the \
     tool that makes progress now, or 'finish_task' if you are done.";

/// What the controller decided to do about a non-tool response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionStep {
    /// Append `nudge` to the transcript and think again.
    Retry { nudge: &'static str },
    /// Escalation exhausted; abort the run.
    GiveUp,
}

/// Decide the next step for the given escalation level.
pub fn escalate(level: u8) -> CorrectionStep {
    match level {
        0 => CorrectionStep::Retry { nudge: NUDGE },
        1 => CorrectionStep::Retry { nudge: FINAL_NUDGE },
        _ => CorrectionStep::GiveUp,
    }
}

/// Tool-choice mode dictated by the current escalation level.
///
/// Level 2 compels some tool call; below that the model may still choose.
pub fn tool_choice_for(level: u8) -> ToolChoice {
    if level >= MAX_ESCALATION {
        ToolChoice::ForceAny
    } else {
        ToolChoice::Auto
    }
}
