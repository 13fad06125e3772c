//! Rooted file-manipulation tools for the TicketForge agent.
//!
//! Six tools are exposed to the model: `read_file`, `write_file`,
//! `list_directory`, `search_files`, `peek_file` and `read_files`.
//! Each request is decoded into a typed [`ToolRequest`] before anything
//! touches the filesystem, and every path is resolved inside the
//! dispatcher's working directory.
//!
//! `peek_file` and `read_files` exist to answer "what is in this file"
//! for far fewer tokens than a full `read_file`.

pub mod dispatcher;
pub mod file_read;
pub mod file_write;
pub mod list_dir;
pub mod repo_context;
pub mod search;

pub use dispatcher::{ToolCategory, ToolDispatcher, ToolOutput, ToolRequest, catalog};
pub use repo_context::repository_listing;
