//! Deterministic keyword extraction from task title and description.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// Maximum keywords embedded in a planner input.
pub const MAX_KEYWORDS: usize = 12;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "but", "by", "can", "could", "do", "does", "for", "from", "has", "have", "if", "in",
    "into", "is", "it", "its", "may", "more", "must", "new", "no", "not", "of", "on", "or", "our",
    "should", "so", "some", "than", "that", "the", "their", "then", "there", "these", "this", "to",
    "use", "used", "using", "was", "we", "when", "which", "while", "will", "with", "would", "you",
    "your",
];

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z0-9_]+").expect("static word pattern"))
}

/// Extract a bounded keyword list from free text.
///
/// Case-normalized, stop-word filtered, ranked by frequency descending with
/// lexical order breaking ties, capped at `max`. The same text always yields
/// the same list in the same order.
pub fn extract_keywords(title: &str, description: &str, max: usize) -> Vec<String> {
    let text = format!("{} {}", title, description).to_lowercase();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for found in word_pattern().find_iter(&text) {
        let word = found.as_str();
        if word.len() < 2 || word.chars().all(|ch| ch.is_ascii_digit()) {
            continue;
        }
        if STOPWORDS.binary_search(&word).is_ok() {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    // BTreeMap iteration is lexical, so equal counts stay lexically ordered
    // through the stable sort below.
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(max)
        .map(|(word, _)| word.to_string())
        .collect()
}
