//! Security module for TicketForge — filesystem sandboxing.
//!
//! Every path the model hands to a file tool is relative to one rooted
//! working directory. [`SandboxRoot`] resolves such paths and rejects any
//! that would land outside the root, whether through `..` components,
//! absolute paths, or symlinks pointing elsewhere.

pub mod path;

pub use path::{PathValidationError, SandboxRoot};
