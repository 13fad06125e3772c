//! Branch Namer — deterministic, VCS-safe branch names for a ticket.

use sha2::{Digest, Sha256};
use ticketforge_core::ticket::TicketAnalysis;

const MAX_SLUG_CHARS: usize = 50;
const HASH_PREFIX_CHARS: usize = 8;

/// Lower-cased, hyphen-separated rendering of `title`, at most 50 chars.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_hyphen = true;
        }
    }

    slug.truncate(MAX_SLUG_CHARS);
    slug.trim_end_matches('-').to_string()
}

/// First eight hex characters of the SHA-256 of `text`.
pub fn short_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_PREFIX_CHARS);
    hex
}

/// `{namespace}{ticket-or-hash}-{slug}`, a pure function of its inputs.
pub fn derive_branch_name(analysis: &TicketAnalysis, raw_ticket: &str, namespace: &str) -> String {
    let id = match &analysis.ticket_number {
        Some(number) if !number.trim().is_empty() => slugify(number),
        _ => short_hash(raw_ticket),
    };
    let slug = slugify(&analysis.title);
    let slug = if slug.is_empty() { "update".to_string() } else { slug };
    format!("{namespace}{id}-{slug}")
}
