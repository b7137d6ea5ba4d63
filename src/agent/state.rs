//! Per-run control state and outcome types.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a run ended without the terminal tool firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    TurnLimitExceeded,
    StalledAfterEscalation,
    TransportFailure,
    WorkspaceMissing,
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AbortReason::TurnLimitExceeded => "turn limit exceeded",
            AbortReason::StalledAfterEscalation => "stalled after escalation",
            AbortReason::TransportFailure => "transport failure",
            AbortReason::WorkspaceMissing => "workspace missing",
            AbortReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Phases of one run's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Routed,
    Thinking,
    Dispatching,
    Observing,
    Correcting,
    Terminated,
    Aborted,
}

/// Mutable control state of one ticket's execution.
///
/// Owned exclusively by its execution loop; never shared across runs.
#[derive(Debug)]
pub struct RunState {
    /// Unique id of this run, for log correlation.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Thinking cycles entered so far.
    pub turns: u32,
    /// Current self-correction escalation level (0, 1, 2).
    pub escalation: u8,
    /// Last observed failure description, if any.
    pub last_failure: Option<String>,
    /// Set when the terminal tool fires, with its summary.
    pub terminal_summary: Option<String>,
    /// Current phase, tracked for logging.
    pub phase: RunPhase,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            turns: 0,
            escalation: 0,
            last_failure: None,
            terminal_summary: None,
            phase: RunPhase::Routed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_summary.is_some()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation signal for an in-flight run.
///
/// Checked at the top of every thinking cycle; a cancelled run aborts
/// between turns, never mid-dispatch.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next turn boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Final outcome of one run; exactly one per ticket execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub ticket_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
    /// Thinking cycles consumed.
    pub turns: u32,
}

impl RunResult {
    pub fn success(ticket_id: impl Into<String>, summary: impl Into<String>, turns: u32) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            success: true,
            summary: Some(summary.into()),
            abort_reason: None,
            turns,
        }
    }

    pub fn aborted(ticket_id: impl Into<String>, reason: AbortReason, turns: u32) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            success: false,
            summary: None,
            abort_reason: Some(reason),
            turns,
        }
    }
}
