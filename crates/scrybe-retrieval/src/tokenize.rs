//! Lexical tokenization shared by indexing and querying (§4.7 "a lexical
//! index over text-bearing records").

use std::collections::BTreeSet;

/// Common English stop words excluded from the lexical term set so
/// high-frequency words don't dilute genuine relevance overlap.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "was", "has", "are", "not", "this", "that", "with", "from", "have", "you", "can", "its",
    "will", "but", "they", "all", "been", "also", "into", "more", "than", "when", "who", "what", "how", "out", "our",
    "new", "now",
];

/// Lowercase alphanumeric terms of length >= 3, stop words removed.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_short_and_stop_words() {
        let terms = tokenize("The cat sat on a new mat");
        assert!(!terms.contains("the"));
        assert!(!terms.contains("new"));
        assert!(terms.contains("cat"));
        assert!(terms.contains("sat"));
        assert!(terms.contains("mat"));
    }

    #[test]
    fn lowercases_and_splits_on_punctuation() {
        let terms = tokenize("Invoice #4471, Acme-Corp");
        assert!(terms.contains("invoice"));
        assert!(terms.contains("4471"));
        assert!(terms.contains("acme"));
        assert!(terms.contains("corp"));
    }
}
