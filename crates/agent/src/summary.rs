//! Parsing of the model's final JSON summary into a [`TicketAnalysis`].
//!
//! Models wrap JSON in prose or markdown fences more often than not, so the
//! text is tried whole, then inside ```` ```json ```` fences, then inside
//! bare fences, then between the outermost braces.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::LazyLock;
use ticketforge_core::error::Error;
use ticketforge_core::ticket::{Complexity, TicketAnalysis};

use crate::metadata::derive_title;

/// Plan used when the model gave none.
pub const DEFAULT_PLAN: [&str; 3] = [
    "Analyze requirements",
    "Implement changes",
    "Test implementation",
];

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)```").expect("fence pattern is valid"));

static BARE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*\s*(.*?)```").expect("fence pattern is valid")
});

/// What the model reported at the end of the run. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalSummary {
    pub title: Option<String>,
    pub requirements: Vec<String>,
    pub files_to_modify: Vec<String>,
    pub implementation_plan: Vec<String>,
    pub estimated_complexity: Option<Complexity>,
    /// Per-file change descriptions keyed by path
    pub changes: HashMap<String, String>,
}

/// The first JSON object found in `text`.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();

    let fenced = JSON_FENCE
        .captures_iter(trimmed)
        .chain(BARE_FENCE.captures_iter(trimmed))
        .filter_map(|c| c.get(1).map(|m| m.as_str()));

    let braces = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&trimmed[start..=end]),
        _ => None,
    };

    std::iter::once(trimmed)
        .chain(fenced)
        .chain(braces)
        .find_map(|candidate| match serde_json::from_str(candidate.trim()) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn field<'a>(map: &'a Map<String, Value>, snake: &str, camel: &str) -> Option<&'a Value> {
    map.get(snake).or_else(|| map.get(camel))
}

fn change_descriptions(value: Option<&Value>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    match value {
        Some(Value::Object(entries)) => {
            for (path, desc) in entries {
                if let Some(desc) = desc.as_str() {
                    out.insert(path.clone(), desc.to_string());
                }
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                let path = item
                    .get("file_path")
                    .or_else(|| item.get("path"))
                    .and_then(Value::as_str);
                let desc = item
                    .get("change_description")
                    .or_else(|| item.get("description"))
                    .and_then(Value::as_str);
                if let (Some(path), Some(desc)) = (path, desc) {
                    out.insert(path.to_string(), desc.to_string());
                }
            }
        }
        _ => {}
    }
    out
}

/// Parse the model's final reply.
pub fn parse_summary(text: &str) -> Result<FinalSummary, Error> {
    let map = extract_json_object(text).ok_or_else(|| {
        Error::MalformedOutput("final reply contains no JSON object".into())
    })?;

    Ok(FinalSummary {
        title: map
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
        requirements: string_list(map.get("requirements")),
        files_to_modify: string_list(field(&map, "files_to_modify", "filesToModify")),
        implementation_plan: string_list(field(&map, "implementation_plan", "implementationPlan")),
        estimated_complexity: field(&map, "estimated_complexity", "estimatedComplexity")
            .and_then(Value::as_str)
            .and_then(Complexity::parse_lenient),
        changes: change_descriptions(map.get("changes")),
    })
}

/// Build the analysis, filling whatever the summary lacks from the ticket
/// itself and the files actually written.
pub fn build_analysis(
    summary: &FinalSummary,
    ticket: &str,
    ticket_number: Option<String>,
    written: &[String],
) -> TicketAnalysis {
    let requirements = if summary.requirements.is_empty() {
        let text = ticket.trim();
        if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        }
    } else {
        summary.requirements.clone()
    };

    TicketAnalysis {
        title: summary
            .title
            .clone()
            .unwrap_or_else(|| derive_title(ticket)),
        description: ticket.to_string(),
        requirements,
        files_to_modify: if summary.files_to_modify.is_empty() {
            written.to_vec()
        } else {
            summary.files_to_modify.clone()
        },
        implementation_plan: if summary.implementation_plan.is_empty() {
            DEFAULT_PLAN.iter().map(|s| s.to_string()).collect()
        } else {
            summary.implementation_plan.clone()
        },
        estimated_complexity: summary.estimated_complexity.unwrap_or_default(),
        ticket_number,
    }
}
