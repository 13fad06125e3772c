//! File write tool — create or overwrite a file under the working directory.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader never observes a half-written file.

use serde::Deserialize;
use std::path::Path;
use ticketforge_core::error::ToolError;
use ticketforge_core::provider::ToolDefinition;
use ticketforge_security::SandboxRoot;
use tracing::debug;

use crate::dispatcher::{ToolOutput, resolve};

pub const WRITE_FILE: &str = "write_file";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WriteFileInput {
    pub path: String,
    pub content: String,
    /// One-line summary of the change, used in the run result
    #[serde(default)]
    pub description: Option<String>,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: WRITE_FILE.into(),
        description: "Write the complete content of a file. Creates parent directories as needed and overwrites any existing file.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "content": {
                    "type": "string",
                    "description": "The full new content of the file"
                },
                "description": {
                    "type": "string",
                    "description": "Optional one-line summary of what changed"
                }
            },
            "required": ["path", "content"]
        }),
    }
}

pub(crate) async fn write_file(
    root: &SandboxRoot,
    input: &WriteFileInput,
) -> Result<ToolOutput, ToolError> {
    let full = resolve(root, &input.path)?;
    if full == root.path() {
        return Err(ToolError::InvalidArguments {
            tool_name: WRITE_FILE.into(),
            reason: "'path' must name a file".into(),
        });
    }

    let previous_content = match tokio::fs::metadata(&full).await {
        Ok(meta) if meta.is_dir() => {
            return Err(ToolError::Io {
                operation: "write",
                path: input.path.clone(),
                reason: "path is a directory".into(),
            });
        }
        Ok(_) => tokio::fs::read_to_string(&full).await.ok(),
        Err(_) => None,
    };
    let created = previous_content.is_none() && !full.exists();

    if let Some(parent) = full.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::io("create directory", &input.path, e))?;
    }

    write_atomic(&full, &input.content)
        .await
        .map_err(|e| ToolError::io("write", &input.path, e))?;

    let path = root.relative(&full);
    debug!(path = %path, bytes = input.content.len(), created, "Wrote file");

    Ok(ToolOutput::FileWritten {
        path,
        bytes_written: input.content.len(),
        created,
        previous_content,
    })
}

async fn write_atomic(target: &Path, content: &str) -> std::io::Result<()> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = target.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    if let Err(e) = tokio::fs::write(&tmp, content).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
