//! ticketsmith: an autonomous ticket-resolution agent engine.
//!
//! A ticket is routed to one of three specialist profiles (Coder,
//! Bugfixer, Analyst), then a tool-calling loop drives the model until it
//! signals completion through the terminal tool or a hard ceiling ends the
//! run. Degenerate model output (narration instead of action) is handled
//! by an escalating self-correction policy, so every run terminates with
//! exactly one outcome report.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod tools;
pub mod tracker;
pub mod workspace;
