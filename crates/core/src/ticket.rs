//! Ticket analysis and run output types.
//!
//! These are the externally visible results of one run: what the agent
//! understood the ticket to ask for, and which files it actually wrote.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// How much work the ticket was judged to require.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    /// Lenient parse used for model output ("Low", " HIGH ", ...).
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured understanding of a ticket, built once per run after the
/// tool-use loop ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketAnalysis {
    pub title: String,

    /// The ticket text, verbatim
    pub description: String,

    pub requirements: Vec<String>,

    /// Repo-root-relative paths (may be empty)
    pub files_to_modify: Vec<String>,

    pub implementation_plan: Vec<String>,

    pub estimated_complexity: Complexity,

    /// Identifier such as "PROJ-123", when one was found in the ticket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
}

/// One file actually written during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChange {
    /// Repo-root-relative path
    pub file_path: String,

    /// Content before the run touched the file; empty when not tracked
    pub original_content: String,

    /// Final content after the run
    pub new_content: String,

    pub change_description: String,
}

/// The output of one run: an analysis plus the ordered list of changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub analysis: TicketAnalysis,
    pub changes: Vec<CodeChange>,
}

impl RunResult {
    /// Render a Markdown review body for whoever publishes the change set.
    pub fn review_body(&self) -> String {
        let a = &self.analysis;
        let mut body = String::new();

        let _ = writeln!(body, "## Description\n{}\n", a.description.trim());

        body.push_str("## Requirements\n");
        for req in &a.requirements {
            let _ = writeln!(body, "- {req}");
        }

        body.push_str("\n## Implementation Plan\n");
        for (i, step) in a.implementation_plan.iter().enumerate() {
            let _ = writeln!(body, "{}. {step}", i + 1);
        }

        body.push_str("\n## Changes Made\n");
        for change in &self.changes {
            let _ = writeln!(
                body,
                "- **{}**: {}",
                change.file_path, change.change_description
            );
        }

        let level = a.estimated_complexity.as_str();
        let mut chars = level.chars();
        let capitalized: String = chars
            .next()
            .map(|c| c.to_ascii_uppercase().to_string() + chars.as_str())
            .unwrap_or_default();
        let _ = write!(body, "\n## Complexity\n{capitalized}\n");

        body
    }
}
