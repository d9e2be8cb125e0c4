//! Shared text primitives for the prompt builder and the scorer

use std::sync::OnceLock;

use regex::Regex;

/// Stop words dropped from keyword extraction and content-word analysis.
pub(crate) const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "for", "of", "to", "in", "on", "with", "is", "are", "be", "as",
    "that", "this", "it", "by", "from", "at", "about", "into", "over", "after", "than", "then",
    "so", "such", "can", "will", "would", "should", "could", "may", "you", "your", "yours", "we",
    "our", "ours", "i", "me", "my", "he", "she", "they", "them", "their", "its", "was", "were",
    "been", "being", "has", "have", "had", "do", "does", "did", "not", "no", "but", "if", "what",
    "which", "who", "how", "when", "where", "why", "all", "any", "each", "also", "there", "these",
    "those", "very", "just",
];

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z0-9']+").expect("static regex"))
}

fn sentence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]+(?:\s+|$)|\n+").expect("static regex"))
}

fn vowel_group_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[aeiouy]+").expect("static regex"))
}

/// Lowercase alphanumeric word tokens (apostrophes kept).
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_pattern()
        .find_iter(&lower)
        .map(|m| m.as_str().trim_matches('\'').to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

pub(crate) fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Tokens with stop words removed.
pub(crate) fn content_words(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|w| !is_stop_word(w))
        .collect()
}

/// Sentences split on terminal punctuation and line breaks; fragments without a
/// word are dropped.
pub(crate) fn sentences(text: &str) -> Vec<&str> {
    sentence_pattern()
        .split(text)
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

/// Vowel-group syllable estimate for one lowercase word.
pub(crate) fn syllables(word: &str) -> usize {
    vowel_group_pattern().find_iter(word).count()
}
