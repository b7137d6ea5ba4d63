//! Task-tracker integration.
//!
//! The tracker is an external collaborator; the engine consumes it through
//! the narrow [`TaskSource`] trait. Tickets are read-only inside the core.

mod http;

pub use http::HttpTaskSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::RunResult;
use crate::error::TrackerError;

/// One unit of externally assigned work. Immutable within the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<TicketContext>,
}

/// Optional structured context attached to a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_hints: Vec<String>,
}

/// Source of tickets and sink of outcomes.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Fetch the next open ticket assigned to this agent, if any.
    async fn fetch_next_ticket(&self) -> Result<Option<Ticket>, TrackerError>;

    /// Report a run's outcome back to the tracker.
    async fn report_outcome(&self, ticket_id: &str, result: &RunResult)
        -> Result<(), TrackerError>;
}
