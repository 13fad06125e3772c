//! Prompt text the orchestrator authors: the seed, the kickoff turn, and
//! the directives injected when the run has to wrap up.

use std::fmt::Write as _;
use ticketforge_core::provider::ToolDefinition;
use ticketforge_tools::file_read::truncate_at_char_boundary;

/// Injected once when the overall tool-call ceiling is reached.
pub const TOOL_BUDGET_DIRECTIVE: &str = "Tool budget exhausted. Stop exploring now. \
Write your changes immediately with write_file using what you already know, \
then reply with the final JSON summary.";

/// Injected before the single retry after a rate-limit signal.
pub const RATE_LIMIT_DIRECTIVE: &str = "The model service is rate limiting this run. \
Do not explore further. Implement the changes now with write_file and keep the \
response short.";

/// Sent as the first user turn, after the seed.
pub const KICKOFF: &str = "Start implementing the ticket.";

const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Cut `context` to at most `max_chars` bytes, ending on a line boundary
/// when one is available.
pub fn truncate_context(context: &str, max_chars: usize) -> String {
    let context = context.trim();
    if context.len() <= max_chars {
        return context.to_string();
    }
    let head = truncate_at_char_boundary(context, max_chars);
    let head = match head.rfind('\n') {
        Some(pos) if pos > 0 => &head[..pos],
        _ => head,
    };
    format!("{head}{TRUNCATION_MARKER}")
}

/// Inputs to the seed prompt.
pub struct SeedPrompt<'a> {
    pub ticket: &'a str,
    pub ticket_number: Option<&'a str>,
    pub keywords: &'a [String],
    pub repo_context: &'a str,
    pub tools: &'a [ToolDefinition],
    pub budget_summary: String,
}

impl SeedPrompt<'_> {
    pub fn render(&self) -> String {
        let mut out = String::from(
            "You are a senior software engineer implementing a ticket directly in a checked-out \
repository. Use the tools to look around, then write complete file contents with write_file. \
All paths are relative to the repository root.\n\n",
        );

        let _ = writeln!(out, "## Ticket\n{}\n", self.ticket.trim());
        if let Some(number) = self.ticket_number {
            let _ = writeln!(out, "Ticket number: {number}\n");
        }
        if !self.keywords.is_empty() {
            let _ = writeln!(out, "## Keywords\n{}\n", self.keywords.join(", "));
        }

        out.push_str("## Repository files\n");
        if self.repo_context.is_empty() {
            out.push_str("(no listing available; use list_directory)\n\n");
        } else {
            let _ = writeln!(out, "{}\n", self.repo_context);
        }

        out.push_str("## Tools\n");
        for tool in self.tools {
            let _ = writeln!(out, "- {}: {}", tool.name, tool.description);
        }
        let _ = writeln!(
            out,
            "\nBudget for this run: {}. Prefer search_files, peek_file and read_files over \
full read_file calls. Stop exploring as soon as you know enough to make the change.\n",
            self.budget_summary
        );

        out.push_str(
            "## Finishing\nWhen every change is written, reply without tool calls. Your final \
reply must be a single JSON object:\n\
{\n  \"title\": \"concise title\",\n  \"requirements\": [\"...\"],\n  \
\"files_to_modify\": [\"path\"],\n  \"implementation_plan\": [\"step\"],\n  \
\"estimated_complexity\": \"low|medium|high\",\n  \
\"changes\": {\"path\": \"one-line description of the change\"}\n}\n",
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_context_unchanged() {
        assert_eq!(truncate_context("src/a.rs\nsrc/b.rs\n", 100), "src/a.rs\nsrc/b.rs");
    }

    #[test]
    fn long_context_cut_on_line_boundary() {
        let context = "src/aaaa.rs\nsrc/bbbb.rs\nsrc/cccc.rs";
        let cut = truncate_context(context, 18);
        assert_eq!(cut, "src/aaaa.rs\n... (truncated)");
    }

    #[test]
    fn seed_contains_every_section() {
        let tools = ticketforge_tools::catalog();
        let keywords = vec!["login".to_string(), "button".to_string()];
        let seed = SeedPrompt {
            ticket: "PROJ-1: Add a login button",
            ticket_number: Some("PROJ-1"),
            keywords: &keywords,
            repo_context: "src/app.rs",
            tools: &tools,
            budget_summary: "tool_calls=0/25".into(),
        }
        .render();

        assert!(seed.contains("Add a login button"));
        assert!(seed.contains("Ticket number: PROJ-1"));
        assert!(seed.contains("login, button"));
        assert!(seed.contains("src/app.rs"));
        for tool in &tools {
            assert!(seed.contains(&tool.name), "missing {}", tool.name);
        }
        assert!(seed.contains("\"estimated_complexity\""));
    }

    #[test]
    fn seed_without_listing_points_at_list_directory() {
        let seed = SeedPrompt {
            ticket: "Fix it",
            ticket_number: None,
            keywords: &[],
            repo_context: "",
            tools: &[],
            budget_summary: String::new(),
        }
        .render();
        assert!(seed.contains("use list_directory"));
        assert!(!seed.contains("Ticket number"));
    }
}
