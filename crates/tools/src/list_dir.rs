//! Directory listing tool.

use serde::{Deserialize, Serialize};
use ticketforge_core::error::ToolError;
use ticketforge_core::provider::ToolDefinition;
use ticketforge_security::SandboxRoot;

use crate::dispatcher::{ToolOutput, resolve};

pub const LIST_DIRECTORY: &str = "list_directory";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListDirectoryInput {
    /// Empty means the working directory itself
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: LIST_DIRECTORY.into(),
        description: "List the entries of a directory, each tagged as file or directory.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to the repository root (empty for the root)"
                }
            }
        }),
    }
}

pub(crate) async fn list_directory(
    root: &SandboxRoot,
    input: &ListDirectoryInput,
) -> Result<ToolOutput, ToolError> {
    let full = resolve(root, &input.path)?;
    let mut reader = tokio::fs::read_dir(&full)
        .await
        .map_err(|e| ToolError::io("list", &input.path, e))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| ToolError::io("list", &input.path, e))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind: if is_dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(ToolOutput::DirectoryListing {
        path: root.relative(&full),
        entries,
    })
}
