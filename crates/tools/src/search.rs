//! Text search across the working directory.
//!
//! The walk is bounded three ways besides the result cap: files above a
//! size limit are skipped, and scanning stops after a fixed number of
//! files or bytes, whichever comes first.

use serde::{Deserialize, Serialize};
use std::path::Path;
use ticketforge_config::SearchSettings;
use ticketforge_core::error::ToolError;
use ticketforge_core::provider::ToolDefinition;
use ticketforge_security::SandboxRoot;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::dispatcher::ToolOutput;

pub const SEARCH_FILES: &str = "search_files";

/// Dependency caches, VCS metadata and build output.
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "__pycache__",
    "venv",
    "vendor",
    "coverage",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchFilesInput {
    pub pattern: String,
    #[serde(default)]
    pub file_extension: Option<String>,
}

impl SearchFilesInput {
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.pattern.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                tool_name: SEARCH_FILES.into(),
                reason: "'pattern' must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub path: String,
    /// 1-based line numbers
    pub lines: Vec<usize>,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_FILES.into(),
        description: "Case-insensitive text search across the repository. Returns matching files with the first line numbers of each match. Hidden and build directories are skipped.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Text to search for"
                },
                "file_extension": {
                    "type": "string",
                    "description": "Only search files with this extension, e.g. \"rs\" or \".py\""
                }
            },
            "required": ["pattern"]
        }),
    }
}

/// True for directory names that are never searched or listed.
pub fn is_ignored_dir(name: &str) -> bool {
    name.starts_with('.') || IGNORED_DIRS.contains(&name)
}

fn walk_filter(entry: &DirEntry) -> bool {
    entry.depth() == 0
        || !entry.file_type().is_dir()
        || !is_ignored_dir(&entry.file_name().to_string_lossy())
}

fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim().trim_start_matches('*').trim_start_matches('.');
    (!trimmed.is_empty()).then(|| trimmed.to_ascii_lowercase())
}

fn extension_matches(path: &Path, wanted: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

pub(crate) fn search_files(
    root: &SandboxRoot,
    settings: &SearchSettings,
    input: &SearchFilesInput,
) -> Result<ToolOutput, ToolError> {
    input.validate()?;
    let needle = input.pattern.to_lowercase();
    let extension = input.file_extension.as_deref().and_then(normalize_extension);

    let mut matches = Vec::new();
    let mut scanned_files = 0usize;
    let mut scanned_bytes = 0u64;
    let mut limit_reached = false;

    let walker = WalkDir::new(root.path())
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(walk_filter);

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(ext) = &extension
            && !extension_matches(entry.path(), ext)
        {
            continue;
        }
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(_) => continue,
        };
        if size > settings.max_file_bytes {
            continue;
        }
        if scanned_files >= settings.max_scanned_files
            || scanned_bytes + size > settings.max_scanned_bytes
        {
            limit_reached = true;
            break;
        }
        scanned_files += 1;
        scanned_bytes += size;

        // Binary and non-UTF-8 files are skipped
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };

        let lines: Vec<usize> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| line.to_lowercase().contains(&needle))
            .map(|(i, _)| i + 1)
            .take(settings.max_lines_per_file)
            .collect();
        if lines.is_empty() {
            continue;
        }

        matches.push(SearchMatch {
            path: root.relative(entry.path()),
            lines,
        });
        if matches.len() >= settings.max_result_files {
            limit_reached = true;
            break;
        }
    }

    debug!(
        pattern = %input.pattern,
        matched = matches.len(),
        scanned_files,
        limit_reached,
        "Search complete"
    );

    Ok(ToolOutput::SearchResults {
        pattern: input.pattern.clone(),
        matches,
        limit_reached,
    })
}
