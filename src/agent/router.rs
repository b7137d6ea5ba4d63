//! Routing of tickets to specialist profiles.
//!
//! Pure classification over the ticket text and structured context. The
//! precedence is fixed: error/stack-trace evidence wins over everything
//! (a crash report that also asks for a feature still goes to the
//! Bugfixer), an explicit read-only/review intent selects the Analyst,
//! and everything else is implementation work for the Coder.

use std::sync::LazyLock;

use regex::Regex;

use crate::agent::profile::Specialist;
use crate::tracker::Ticket;

/// Evidence of a concrete failure: exception class names, stack traces,
/// panics, crashes.
static FAILURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b\w+(Exception|Error)\b
        | stack\s*trace
        | \btraceback\b
        | panicked\s+at
        | segmentation\s+fault
        | \bsegfault\b
        | core\s+dumped
        | \bcrash(es|ed|ing)?\b
        | \bbug\b
        | \bregression\b
        | \bbroken\b
        | \bfix(es|ed|ing)?\b
        | does\s+not\s+work
        | doesn'?t\s+work
        ",
    )
    .expect("valid regex")
});

/// Read-only intent: the ticket wants an answer, not a change.
static ANALYSIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \breview\b
        | \bexplain\b
        | \banaly[sz]e\b
        | \banalysis\b
        | \baudit\b
        | \bassess\b
        | \bdocument\b
        | \bsummari[sz]e\b
        | read[-\s]only
        | \bwhat\s+does\b
        | \bhow\s+does\b
        | \bwhy\s+does\b
        ",
    )
    .expect("valid regex")
});

/// Select the specialist for a ticket.
///
/// Total: every ticket yields exactly one specialist.
pub fn route(ticket: &Ticket) -> Specialist {
    let text = format!("{} {}", ticket.title, ticket.body);

    let has_stack_trace = ticket
        .context
        .as_ref()
        .and_then(|ctx| ctx.stack_trace.as_deref())
        .is_some_and(|trace| !trace.trim().is_empty());

    if has_stack_trace || FAILURE_RE.is_match(&text) {
        return Specialist::Bugfixer;
    }

    if ANALYSIS_RE.is_match(&text) {
        return Specialist::Analyst;
    }

    Specialist::Coder
}
