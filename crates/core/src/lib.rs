//! # TicketForge Core
//!
//! Domain types, traits, and error definitions for the TicketForge agent,
//! which turns a free-text ticket into concrete file edits inside a
//! checked-out source tree.
//!
//! This crate has no framework dependencies. It defines the model every
//! other crate implements against:
//! - the transcript exchanged with the model ([`Message`], [`Transcript`])
//! - the model-service seam ([`Provider`])
//! - tool-use records ([`ToolCall`])
//! - the externally visible output ([`RunResult`])

pub mod error;
pub mod message;
pub mod provider;
pub mod ticket;
pub mod tool;

pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{Message, MessageToolCall, Role, Transcript};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use ticket::{CodeChange, Complexity, RunResult, TicketAnalysis};
pub use tool::ToolCall;
