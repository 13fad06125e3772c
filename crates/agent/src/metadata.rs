//! Metadata extraction from raw ticket text.
//!
//! Pure functions over the ticket string: an identifier like `PROJ-123`,
//! a handful of search keywords, and a one-line title.

use regex::Regex;
use std::sync::LazyLock;

/// Title used when the ticket yields nothing usable.
pub const FALLBACK_TITLE: &str = "Implement ticket requirements";

const MAX_KEYWORDS: usize = 6;
const TITLE_SCAN_CHARS: usize = 100;
const MAX_TITLE_CHARS: usize = 80;

static TICKET_DASHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,10}-\d+)\b").expect("ticket pattern is valid"));

static TICKET_JOINED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,10}\d+)\b").expect("ticket pattern is valid"));

static TICKET_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[?[A-Z]{2,10}-?\d+\]?\s*[:\-]?\s*").expect("prefix pattern is valid")
});

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9]{3,}").expect("word pattern is valid"));

/// Articles, filler, and the verbs every ticket starts with.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "are", "was", "were", "has",
    "have", "had", "but", "not", "all", "any", "its", "our", "your", "their", "there", "when",
    "then", "than", "also", "should", "must", "will", "would", "can", "could", "need", "needs",
    "please", "add", "adds", "implement", "fix", "update", "create", "make", "ensure", "allow",
    "support", "ticket", "issue", "task", "story", "feature", "new", "use", "using", "want",
];

/// The first ticket identifier in `text`, e.g. `PROJ-123`.
///
/// Dashed identifiers win over joined ones (`PROJ123`) anywhere in the text.
pub fn extract_ticket_number(text: &str) -> Option<String> {
    TICKET_DASHED
        .captures(text)
        .or_else(|| TICKET_JOINED.captures(text))
        .map(|c| c[1].to_string())
}

/// Up to six lower-cased keywords in first-seen order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in WORD.find_iter(text) {
        let lower = word.as_str().to_lowercase();
        if STOPWORDS.contains(&lower.as_str()) || keywords.contains(&lower) {
            continue;
        }
        keywords.push(lower);
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}

/// A one-line title of at most 80 characters.
pub fn derive_title(text: &str) -> String {
    let stripped = TICKET_PREFIX.replace(text, "");

    let candidate: String = if stripped.contains('\n') {
        stripped
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string()
    } else {
        stripped.chars().take(TITLE_SCAN_CHARS).collect()
    };

    let title: String = candidate.trim().chars().take(MAX_TITLE_CHARS).collect();
    let title = title.trim_end();
    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_number_dashed() {
        assert_eq!(
            extract_ticket_number("PROJ-123: fix the thing").as_deref(),
            Some("PROJ-123")
        );
    }

    #[test]
    fn ticket_number_absent() {
        assert_eq!(extract_ticket_number("no ticket id here"), None);
    }

    #[test]
    fn ticket_number_joined_fallback() {
        assert_eq!(
            extract_ticket_number("See ABC42 for context").as_deref(),
            Some("ABC42")
        );
    }

    #[test]
    fn ticket_number_prefers_dashed_form() {
        assert_eq!(
            extract_ticket_number("ABC42 duplicates WEB-7").as_deref(),
            Some("WEB-7")
        );
    }

    #[test]
    fn ticket_number_ignores_single_letters() {
        assert_eq!(extract_ticket_number("Plan B-2 is fine"), None);
    }

    #[test]
    fn keywords_dedupe_and_drop_stopwords() {
        let kw = extract_keywords("Add the login button. The Login button should call the auth API.");
        assert_eq!(kw, vec!["login", "button", "call", "auth", "api"]);
    }

    #[test]
    fn keywords_capped_at_six() {
        let kw = extract_keywords("alpha beta gamma delta epsilon zeta eta theta iota");
        assert_eq!(kw.len(), 6);
        assert_eq!(kw[0], "alpha");
        assert_eq!(kw[5], "zeta");
    }

    #[test]
    fn keywords_deterministic() {
        let text = "Refactor payment webhook retries for Stripe";
        assert_eq!(extract_keywords(text), extract_keywords(text));
    }

    #[test]
    fn title_empty_falls_back() {
        assert_eq!(derive_title(""), FALLBACK_TITLE);
        assert_eq!(derive_title("   \n\n  "), FALLBACK_TITLE);
    }

    #[test]
    fn title_long_line_truncated() {
        let title = derive_title(&"A".repeat(200));
        assert!(title.chars().count() <= 80);
        assert_eq!(title.chars().count(), 80);
    }

    #[test]
    fn title_strips_ticket_prefix() {
        assert_eq!(derive_title("PROJ-123: Add dark mode"), "Add dark mode");
        assert_eq!(derive_title("[WEB-9] Fix footer"), "Fix footer");
    }

    #[test]
    fn title_uses_first_non_empty_line() {
        assert_eq!(
            derive_title("\n\n  Add CSV export  \nUsers need to export reports."),
            "Add CSV export"
        );
    }

    #[test]
    fn title_only_ticket_number_falls_back() {
        assert_eq!(derive_title("PROJ-1"), FALLBACK_TITLE);
    }
}
