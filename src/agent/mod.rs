//! Core agent logic.
//!
//! The engine orchestrates:
//! - Routing tickets to specialist profiles
//! - The think → dispatch → observe execution loop
//! - Self-correction when the model narrates instead of acting
//! - Exactly one outcome report per run

mod correction;
mod profile;
mod router;
mod run;
mod state;
mod transcript;

pub use correction::{escalate, tool_choice_for, CorrectionStep, MAX_ESCALATION};
pub use profile::{profile_for, Specialist, SpecialistProfile};
pub use router::route;
pub use run::Engine;
pub use state::{AbortReason, CancellationHandle, RunPhase, RunResult, RunState};
pub use transcript::Transcript;
