//! Read tools — `read_file`, `peek_file`, and the batched `read_files`.
//!
//! All three count as one "read" each against the run budget, no matter
//! how many files a batched call touches.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use ticketforge_core::error::ToolError;
use ticketforge_core::provider::ToolDefinition;
use ticketforge_security::SandboxRoot;

use crate::dispatcher::{ToolOutput, resolve};

pub const READ_FILE: &str = "read_file";
pub const PEEK_FILE: &str = "peek_file";
pub const READ_FILES: &str = "read_files";

/// Most paths a single `read_files` call may name.
pub const MAX_BATCH_PATHS: usize = 5;

const DEFAULT_HEAD_LINES: usize = 80;
const DEFAULT_TAIL_LINES: usize = 60;
const DEFAULT_BATCH_MAX_BYTES: usize = 2048;
const PEEK_OUTLINE_LIMIT: usize = 60;
const BATCH_OUTLINE_LIMIT: usize = 12;
const OUTLINE_TEXT_CHARS: usize = 120;

/// Declaration-like lines: classes, functions, constants, types.
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:abstract\s+)?(?:class|function|const|def|interface|type|fn|struct|enum|trait|impl|func)\b",
    )
    .expect("declaration pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadFileInput {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PeekFileInput {
    pub path: String,
    #[serde(default = "default_head_lines")]
    pub head_lines: usize,
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

fn default_head_lines() -> usize {
    DEFAULT_HEAD_LINES
}
fn default_tail_lines() -> usize {
    DEFAULT_TAIL_LINES
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadFilesInput {
    pub paths: Vec<String>,
    #[serde(default = "default_batch_max_bytes")]
    pub max_bytes: usize,
}

fn default_batch_max_bytes() -> usize {
    DEFAULT_BATCH_MAX_BYTES
}

impl ReadFilesInput {
    /// Between one and [`MAX_BATCH_PATHS`] paths.
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.paths.is_empty() || self.paths.len() > MAX_BATCH_PATHS {
            return Err(ToolError::InvalidArguments {
                tool_name: READ_FILES.into(),
                reason: format!(
                    "'paths' must name between 1 and {MAX_BATCH_PATHS} files, got {}",
                    self.paths.len()
                ),
            });
        }
        Ok(())
    }
}

/// One declaration-like line of a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlineEntry {
    /// 1-based line number
    pub line: usize,
    pub text: String,
}

/// The result of peeking at a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeekSummary {
    pub path: String,
    pub total_lines: usize,
    pub head: String,
    /// Empty when the head already covers the whole file
    pub tail: String,
    /// 1-based line number of the first tail line (0 when there is no tail)
    pub tail_start_line: usize,
    pub outline: Vec<OutlineEntry>,
}

/// One entry of a `read_files` batch; either content or an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub truncated: bool,
    pub total_bytes: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outline: Vec<OutlineEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn read_file_definition() -> ToolDefinition {
    ToolDefinition {
        name: READ_FILE.into(),
        description: "Read the full text of a file. Prefer peek_file or read_files when you only need an overview; full reads are expensive.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                }
            },
            "required": ["path"]
        }),
    }
}

pub fn peek_file_definition() -> ToolDefinition {
    ToolDefinition {
        name: PEEK_FILE.into(),
        description: "Cheap overview of a file: the first and last lines, an outline of declarations (classes, functions, constants, types) with line numbers, and the total line count.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "head_lines": {
                    "type": "integer",
                    "description": "Lines to show from the start (default 80)"
                },
                "tail_lines": {
                    "type": "integer",
                    "description": "Lines to show from the end (default 60)"
                }
            },
            "required": ["path"]
        }),
    }
}

pub fn read_files_definition() -> ToolDefinition {
    ToolDefinition {
        name: READ_FILES.into(),
        description: "Read up to 5 files in one call. Each file is cut at max_bytes (marked truncated) and comes with a short outline. A missing file does not fail the others.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "maxItems": MAX_BATCH_PATHS,
                    "description": "File paths relative to the repository root"
                },
                "max_bytes": {
                    "type": "integer",
                    "description": "Per-file byte cap (default 2048)"
                }
            },
            "required": ["paths"]
        }),
    }
}

pub(crate) async fn read_file(
    root: &SandboxRoot,
    input: &ReadFileInput,
) -> Result<ToolOutput, ToolError> {
    let full = resolve(root, &input.path)?;
    let content = tokio::fs::read_to_string(&full)
        .await
        .map_err(|e| ToolError::io("read", &input.path, e))?;

    Ok(ToolOutput::FileContent {
        path: root.relative(&full),
        total_lines: content.lines().count(),
        content,
    })
}

pub(crate) async fn peek_file(
    root: &SandboxRoot,
    input: &PeekFileInput,
) -> Result<ToolOutput, ToolError> {
    let full = resolve(root, &input.path)?;
    let content = tokio::fs::read_to_string(&full)
        .await
        .map_err(|e| ToolError::io("peek", &input.path, e))?;

    Ok(ToolOutput::FilePeek(summarize(
        root.relative(&full),
        &content,
        input.head_lines,
        input.tail_lines,
    )))
}

pub(crate) async fn read_files(
    root: &SandboxRoot,
    input: &ReadFilesInput,
) -> Result<ToolOutput, ToolError> {
    input.validate()?;
    let max_bytes = input.max_bytes.max(1);

    let mut files = Vec::with_capacity(input.paths.len());
    for path in &input.paths {
        let read = match resolve(root, path) {
            Ok(full) => tokio::fs::read_to_string(&full)
                .await
                .map_err(|e| ToolError::io("read", path, e)),
            Err(e) => Err(e),
        };

        files.push(match read {
            Ok(content) => {
                let kept = truncate_at_char_boundary(&content, max_bytes);
                BatchEntry {
                    path: path.clone(),
                    truncated: kept.len() < content.len(),
                    total_bytes: content.len(),
                    outline: outline(&content, BATCH_OUTLINE_LIMIT),
                    content: Some(kept.to_string()),
                    error: None,
                }
            }
            Err(ToolError::PathNotFound(_)) => BatchEntry {
                path: path.clone(),
                content: None,
                truncated: false,
                total_bytes: 0,
                outline: Vec::new(),
                error: Some("not found".into()),
            },
            Err(e) => BatchEntry {
                path: path.clone(),
                content: None,
                truncated: false,
                total_bytes: 0,
                outline: Vec::new(),
                error: Some(e.to_string()),
            },
        });
    }

    Ok(ToolOutput::FileBatch { files })
}

/// Head, tail, and outline of a file's content.
pub fn summarize(path: String, content: &str, head_lines: usize, tail_lines: usize) -> PeekSummary {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();
    let head_end = head_lines.min(total);
    let tail_len = tail_lines.min(total - head_end);
    let tail_start = total - tail_len;

    PeekSummary {
        path,
        total_lines: total,
        head: lines[..head_end].join("\n"),
        tail: lines[tail_start..].join("\n"),
        tail_start_line: if tail_len == 0 { 0 } else { tail_start + 1 },
        outline: outline(content, PEEK_OUTLINE_LIMIT),
    }
}

/// Declaration-like lines with their 1-based line numbers.
pub fn outline(content: &str, limit: usize) -> Vec<OutlineEntry> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| DECLARATION.is_match(line))
        .take(limit)
        .map(|(i, line)| OutlineEntry {
            line: i + 1,
            text: line.trim().chars().take(OUTLINE_TEXT_CHARS).collect(),
        })
        .collect()
}

/// The longest prefix of `s` that fits in `max_bytes` without splitting a
/// UTF-8 sequence.
pub fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
