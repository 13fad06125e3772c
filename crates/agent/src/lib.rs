//! The ticket orchestrator — the heart of TicketForge.
//!
//! One run takes free-text ticket text and a working directory and follows
//! a **seed → model → tools → model** cycle:
//!
//! 1. **Extract** a ticket number, keywords, and a title from the ticket
//! 2. **Seed** the transcript with the ticket, repository listing, and tool catalog
//! 3. **Prune** the transcript and call the model
//! 4. **If tool calls**: check the budget, dispatch, append results, loop back to 3
//! 5. **If text**: parse the final summary and collect the written files
//!
//! A run that writes nothing, or fails, still returns a result holding a
//! notes file.

pub mod branch;
pub mod budget;
pub mod fallback;
pub mod loop_runner;
pub mod metadata;
pub mod prompt;
pub mod pruner;
pub mod summary;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use branch::derive_branch_name;
pub use budget::{BudgetExhausted, BudgetKind, BudgetLimits, BudgetState};
pub use loop_runner::{Orchestrator, OrchestratorConfig};
pub use metadata::{derive_title, extract_keywords, extract_ticket_number};
pub use pruner::prune;
