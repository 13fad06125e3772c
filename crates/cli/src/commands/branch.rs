//! `ticketforge branch` — print the branch name a ticket would get.
//!
//! Uses only the ticket text, so the title comes from the first line rather
//! than from a model summary.

use std::path::PathBuf;
use ticketforge_agent::summary::{FinalSummary, build_analysis};
use ticketforge_agent::{derive_branch_name, extract_ticket_number};
use ticketforge_config::AppConfig;

pub async fn run(ticket: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let text = super::read_ticket(ticket.as_deref())?;
    println!("{}", branch_for(&text, &config.agent.branch_prefix));
    Ok(())
}

fn branch_for(ticket: &str, prefix: &str) -> String {
    let analysis = build_analysis(
        &FinalSummary::default(),
        ticket,
        extract_ticket_number(ticket),
        &[],
    );
    derive_branch_name(&analysis, ticket, prefix)
}
