//! Tool Dispatcher — the only component that touches the filesystem.
//!
//! Each tool's input is a typed record validated here, before anything is
//! resolved or read. Unknown tool names and malformed arguments are rejected
//! up front; every path goes through [`SandboxRoot::resolve`].

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use ticketforge_config::SearchSettings;
use ticketforge_core::error::ToolError;
use ticketforge_core::provider::ToolDefinition;
use ticketforge_security::SandboxRoot;
use tracing::debug;

use crate::file_read::{
    self, BatchEntry, PEEK_FILE, PeekFileInput, PeekSummary, READ_FILE, READ_FILES, ReadFileInput,
    ReadFilesInput,
};
use crate::file_write::{self, WRITE_FILE, WriteFileInput};
use crate::list_dir::{self, DirEntry, LIST_DIRECTORY, ListDirectoryInput};
use crate::search::{self, SEARCH_FILES, SearchFilesInput, SearchMatch};

/// A validated tool request, one variant per tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    ReadFile(ReadFileInput),
    WriteFile(WriteFileInput),
    ListDirectory(ListDirectoryInput),
    SearchFiles(SearchFilesInput),
    PeekFile(PeekFileInput),
    ReadFiles(ReadFilesInput),
}

/// Budget category a request is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    Read,
    Search,
    /// `write_file`; still allowed while the run is wrapping up
    Write,
    /// Counted only against the overall tool-call ceiling
    Other,
}

fn decode<T: serde::de::DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool_name: tool.into(),
        reason: e.to_string(),
    })
}

impl ToolRequest {
    /// Validate a model-issued tool call. Nothing here touches the
    /// filesystem or the budget.
    pub fn parse(name: &str, arguments: Value) -> Result<Self, ToolError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        match name {
            READ_FILE => decode(name, arguments).map(Self::ReadFile),
            WRITE_FILE => decode(name, arguments).map(Self::WriteFile),
            LIST_DIRECTORY => decode(name, arguments).map(Self::ListDirectory),
            SEARCH_FILES => {
                let input: SearchFilesInput = decode(name, arguments)?;
                input.validate()?;
                Ok(Self::SearchFiles(input))
            }
            PEEK_FILE => decode(name, arguments).map(Self::PeekFile),
            READ_FILES => {
                let input: ReadFilesInput = decode(name, arguments)?;
                input.validate()?;
                Ok(Self::ReadFiles(input))
            }
            other => Err(ToolError::NotFound(other.into())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadFile(_) => READ_FILE,
            Self::WriteFile(_) => WRITE_FILE,
            Self::ListDirectory(_) => LIST_DIRECTORY,
            Self::SearchFiles(_) => SEARCH_FILES,
            Self::PeekFile(_) => PEEK_FILE,
            Self::ReadFiles(_) => READ_FILES,
        }
    }

    pub fn category(&self) -> ToolCategory {
        match self {
            Self::ReadFile(_) | Self::PeekFile(_) | Self::ReadFiles(_) => ToolCategory::Read,
            Self::SearchFiles(_) => ToolCategory::Search,
            Self::WriteFile(_) => ToolCategory::Write,
            Self::ListDirectory(_) => ToolCategory::Other,
        }
    }
}

/// Successful tool output, serialized as the tool-result payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutput {
    FileContent {
        path: String,
        content: String,
        total_lines: usize,
    },
    FileWritten {
        path: String,
        bytes_written: usize,
        created: bool,
        /// Content before this write; kept out of the transcript
        #[serde(skip)]
        previous_content: Option<String>,
    },
    DirectoryListing {
        path: String,
        entries: Vec<DirEntry>,
    },
    SearchResults {
        pattern: String,
        matches: Vec<SearchMatch>,
        limit_reached: bool,
    },
    FilePeek(PeekSummary),
    FileBatch {
        files: Vec<BatchEntry>,
    },
}

impl ToolOutput {
    /// JSON text sent back to the model.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"failed to encode tool output: {e}"}}"#))
    }
}

/// Executes tool requests against one working directory.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    root: Option<SandboxRoot>,
    search: SearchSettings,
}

impl ToolDispatcher {
    /// Dispatcher rooted at an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ToolError> {
        let root = SandboxRoot::new(root).map_err(|e| ToolError::PathRejected(e.to_string()))?;
        Ok(Self {
            root: Some(root),
            search: SearchSettings::default(),
        })
    }

    /// Dispatcher with no working directory; every request fails with
    /// [`ToolError::RootNotConfigured`].
    pub fn unrooted() -> Self {
        Self {
            root: None,
            search: SearchSettings::default(),
        }
    }

    pub fn with_search_settings(mut self, settings: SearchSettings) -> Self {
        self.search = settings;
        self
    }

    pub fn root(&self) -> Option<&SandboxRoot> {
        self.root.as_ref()
    }

    fn require_root(&self) -> Result<&SandboxRoot, ToolError> {
        self.root.as_ref().ok_or(ToolError::RootNotConfigured)
    }

    /// Execute one request.
    pub async fn execute(&self, request: &ToolRequest) -> Result<ToolOutput, ToolError> {
        let root = self.require_root()?;
        debug!(tool = request.name(), "Dispatching tool");

        match request {
            ToolRequest::ReadFile(input) => file_read::read_file(root, input).await,
            ToolRequest::WriteFile(input) => file_write::write_file(root, input).await,
            ToolRequest::ListDirectory(input) => list_dir::list_directory(root, input).await,
            ToolRequest::PeekFile(input) => file_read::peek_file(root, input).await,
            ToolRequest::ReadFiles(input) => file_read::read_files(root, input).await,
            ToolRequest::SearchFiles(input) => {
                let root = root.clone();
                let settings = self.search.clone();
                let input = input.clone();
                tokio::task::spawn_blocking(move || search::search_files(&root, &settings, &input))
                    .await
                    .map_err(|e| ToolError::Io {
                        operation: "search",
                        path: String::new(),
                        reason: e.to_string(),
                    })?
            }
        }
    }

    /// Current content of a file, outside any budget. Used to collect the
    /// final state of written files once the loop has ended.
    pub async fn read_snapshot(&self, path: &str) -> Result<String, ToolError> {
        let root = self.require_root()?;
        let full = resolve(root, path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| ToolError::io("read", path, e))
    }

    /// Write a file outside any budget.
    pub async fn write_artifact(&self, path: &str, content: &str) -> Result<ToolOutput, ToolError> {
        let root = self.require_root()?;
        file_write::write_file(
            root,
            &WriteFileInput {
                path: path.into(),
                content: content.into(),
                description: None,
            },
        )
        .await
    }
}

/// Resolve a tool path inside the root.
pub(crate) fn resolve(root: &SandboxRoot, path: &str) -> Result<PathBuf, ToolError> {
    root.resolve(path)
        .map_err(|e| ToolError::PathRejected(e.to_string()))
}

/// Definitions of every tool, in the order they are offered to the model.
pub fn catalog() -> Vec<ToolDefinition> {
    vec![
        file_read::read_file_definition(),
        file_write::definition(),
        list_dir::definition(),
        search::definition(),
        file_read::peek_file_definition(),
        file_read::read_files_definition(),
    ]
}
