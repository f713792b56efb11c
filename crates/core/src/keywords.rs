//! Local keyword extraction, the dependency-free fallback for the keyword tier.
//!
//! Lowercases, splits on non-alphanumerics, drops stopwords and very short
//! tokens, and keeps first-seen order.

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "but", "by", "can", "could", "did", "do", "does",
    "doing", "for", "from", "get", "got", "had", "has", "have", "having", "he", "her", "here",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most",
    "my", "myself", "no", "not", "now", "of", "on", "one", "only", "or", "our", "out", "over",
    "own", "really", "same", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "want", "was", "way", "we", "were", "what", "when", "where",
    "which", "while", "who", "why", "will", "with", "would", "you", "your",
];

/// Minimum token length kept as a keyword.
pub const MIN_KEYWORD_LEN: usize = 3;

/// Split text into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Extract up to `max` salient keywords from `text`.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_KEYWORD_LEN && !is_stopword(t))
        .filter(|t| seen.insert(t.clone()))
        .take(max)
        .collect()
}
