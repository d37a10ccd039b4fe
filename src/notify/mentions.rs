//! `@handle` extraction

use regex::Regex;
use std::sync::OnceLock;

fn mention_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(\w+)").ok()).as_ref()
}

/// Every `@handle` occurrence in order, repeats included
pub fn extract_mentions(text: &str) -> Vec<String> {
    let Some(re) = mention_regex() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Distinct handles in first-seen order, for a single lookup query
pub fn distinct_handles(mentions: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(mentions.len());
    for m in mentions {
        if !seen.contains(m) {
            seen.push(m.clone());
        }
    }
    seen
}
