//! Fallback Producer — a run never ends with an empty change set.
//!
//! When the loop wrote nothing, or failed outright, a single notes file is
//! produced from the analysis (and the error, if any).

use std::fmt::Write as _;
use ticketforge_core::ticket::{CodeChange, Complexity, RunResult, TicketAnalysis};
use ticketforge_tools::ToolDispatcher;
use tracing::warn;

use crate::metadata::{derive_title, extract_ticket_number};
use crate::summary::DEFAULT_PLAN;

/// Analysis for a run that could not produce one from the model.
pub fn fallback_analysis(
    ticket: &str,
    ticket_number: Option<String>,
    notes_file: &str,
    error: Option<&str>,
) -> TicketAnalysis {
    let description = match error {
        Some(err) => format!("{ticket}\n\nAutomated implementation failed: {err}"),
        None => ticket.to_string(),
    };
    let requirement = ticket.trim();

    TicketAnalysis {
        title: derive_title(ticket),
        description,
        requirements: if requirement.is_empty() {
            Vec::new()
        } else {
            vec![requirement.to_string()]
        },
        files_to_modify: vec![notes_file.to_string()],
        implementation_plan: DEFAULT_PLAN.iter().map(|s| s.to_string()).collect(),
        estimated_complexity: Complexity::Medium,
        ticket_number,
    }
}

/// Markdown body of the notes file.
pub fn render_notes(analysis: &TicketAnalysis, ticket: &str, error: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Implementation Notes: {}\n", analysis.title);
    if let Some(number) = &analysis.ticket_number {
        let _ = writeln!(out, "Ticket: {number}\n");
    }

    let _ = writeln!(out, "## Description\n{}\n", ticket.trim());

    out.push_str("## Requirements\n");
    for req in &analysis.requirements {
        let _ = writeln!(out, "- {req}");
    }

    out.push_str("\n## Implementation Plan\n");
    for (i, step) in analysis.implementation_plan.iter().enumerate() {
        let _ = writeln!(out, "{}. {step}", i + 1);
    }

    match error {
        Some(err) => {
            let _ = write!(out, "\n## Error\nThe automated run failed:\n\n```\n{err}\n```\n");
        }
        None => out.push_str("\n## Status\nNo file changes were produced automatically. Manual implementation is required.\n"),
    }
    out
}

/// Write the notes file (when the dispatcher has a root) and describe it as
/// the run's single change.
pub async fn produce(
    dispatcher: &ToolDispatcher,
    notes_file: &str,
    analysis: &TicketAnalysis,
    ticket: &str,
    error: Option<&str>,
) -> CodeChange {
    let content = render_notes(analysis, ticket, error);

    let original_content = if dispatcher.root().is_some() {
        let previous = dispatcher.read_snapshot(notes_file).await.unwrap_or_default();
        if let Err(e) = dispatcher.write_artifact(notes_file, &content).await {
            warn!(path = notes_file, error = %e, "Could not write notes file");
        }
        previous
    } else {
        String::new()
    };

    CodeChange {
        file_path: notes_file.to_string(),
        original_content,
        new_content: content,
        change_description: match error {
            Some(_) => "Implementation notes (automated run failed)".into(),
            None => "Implementation notes for manual follow-up".into(),
        },
    }
}

/// Result for a run that failed before or during the loop.
pub async fn error_result(
    dispatcher: &ToolDispatcher,
    notes_file: &str,
    ticket: &str,
    error: &str,
) -> RunResult {
    let analysis = fallback_analysis(ticket, extract_ticket_number(ticket), notes_file, Some(error));
    let change = produce(dispatcher, notes_file, &analysis, ticket, Some(error)).await;
    RunResult {
        analysis,
        changes: vec![change],
    }
}
