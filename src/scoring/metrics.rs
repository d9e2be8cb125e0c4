//! Individual sub-score computations

use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::text::{content_words, syllables, tokenize};

const WORDS_PER_LINE: u32 = 15;
const CHARS_PER_BREAK: f64 = 80.0;

const COHERENCE_CENTER: f64 = 0.28;
const COHERENCE_HALF_WIDTH: f64 = 0.22;
const COHERENCE_FLOOR: f64 = 0.35;
const COHERENCE_NEUTRAL: f64 = 0.65;

const SENTENCE_LENGTH_CENTER: f64 = 18.0;
const SYLLABLE_DENSITY_CENTER: f64 = 1.5;

const MARKER_WORDS: &[&str] = &[
    "therefore",
    "however",
    "consequently",
    "meanwhile",
    "moreover",
    "furthermore",
    "additionally",
    "thus",
    "hence",
    "finally",
    "similarly",
    "instead",
    "because",
    "next",
];

const MARKER_PHRASES: &[&str] = &[
    "as a result",
    "building on this",
    "in addition",
    "for example",
    "in contrast",
    "on the other hand",
    "in short",
];

fn heading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]+\S|\d+[.)][ \t]+\S)").expect("static regex")
    })
}

fn list_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^[ \t]*[-*+•][ \t]+\S").expect("static regex"))
}

fn target_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)at\s+least\s+(\d+)\s+(lines?|words?)").expect("static regex")
    })
}

/// Prompt keyword coverage.
pub(super) struct Coverage {
    pub score: f64,
    pub matched: Vec<String>,
    pub missed: Vec<String>,
}

/// 4-gram repetition statistics.
pub(super) struct Repetition {
    pub score: f64,
    pub total: usize,
    pub repeated: usize,
}

/// The `cap` most frequent content words of the prompt (ties keep first-seen
/// order).
pub(super) fn top_keywords(prompt: &str, cap: usize) -> Vec<String> {
    let mut counts: FxHashMap<String, (usize, usize)> = FxHashMap::default();
    for (position, word) in content_words(prompt)
        .into_iter()
        .filter(|w| w.len() > 2)
        .enumerate()
    {
        counts.entry(word).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
        count_b.cmp(count_a).then(first_a.cmp(first_b))
    });
    ranked.into_iter().take(cap).map(|(word, _)| word).collect()
}

pub(super) fn completeness(keywords: &[String], tokens: &FxHashSet<&str>) -> Coverage {
    if keywords.is_empty() {
        return Coverage {
            score: 0.5,
            matched: Vec::new(),
            missed: Vec::new(),
        };
    }

    let (matched, missed): (Vec<String>, Vec<String>) = keywords
        .iter()
        .cloned()
        .partition(|k| tokens.contains(k.as_str()));

    #[allow(clippy::cast_precision_loss)]
    let score = matched.len() as f64 / keywords.len() as f64;
    Coverage {
        score,
        matched,
        missed,
    }
}

#[allow(clippy::cast_precision_loss)]
pub(super) fn structure(text: &str) -> f64 {
    let mut score = 0.0;
    if heading_pattern().is_match(text) {
        score += 0.5;
    }
    if list_pattern().is_match(text) {
        score += 0.3;
    }

    let chars = text.chars().count() as f64;
    if chars > 0.0 {
        let breaks = text.matches('\n').count() as f64;
        let expected = (chars / CHARS_PER_BREAK).max(1.0);
        score += 0.2 * (breaks / expected).min(1.0);
    }
    score.min(1.0)
}

pub(super) fn redundancy(content: &[String]) -> Repetition {
    if content.len() < 4 {
        return Repetition {
            score: 1.0,
            total: 0,
            repeated: 0,
        };
    }

    let grams: Vec<&[String]> = content.windows(4).collect();
    let unique: FxHashSet<&[String]> = grams.iter().copied().collect();
    let total = grams.len();
    let repeated = total - unique.len();

    #[allow(clippy::cast_precision_loss)]
    let score = 1.0 - repeated as f64 / total as f64;
    Repetition {
        score,
        total,
        repeated,
    }
}

#[allow(clippy::cast_precision_loss)]
pub(super) fn lexical_diversity(content: &[String]) -> f64 {
    if content.is_empty() {
        return 0.2;
    }
    let unique: FxHashSet<&str> = content.iter().map(String::as_str).collect();
    0.2 + 0.8 * (unique.len() as f64 / content.len() as f64)
}

#[allow(clippy::cast_precision_loss)]
fn jaccard(a: &FxHashSet<String>, b: &FxHashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn has_marker(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    MARKER_PHRASES.iter().any(|phrase| lower.contains(phrase))
        || tokenize(&lower)
            .iter()
            .any(|word| MARKER_WORDS.contains(&word.as_str()))
}

#[allow(clippy::cast_precision_loss)]
pub(super) fn coherence(
    sentences: &[&str],
    redundancy: f64,
    structure: f64,
    word_count: usize,
) -> f64 {
    if sentences.len() < 2 {
        return COHERENCE_NEUTRAL;
    }

    let sets: Vec<FxHashSet<String>> = sentences
        .iter()
        .map(|s| content_words(s).into_iter().collect())
        .collect();

    let mut overlaps = Vec::with_capacity(sets.len() * 2);
    for gap in 1..=2 {
        for i in 0..sets.len().saturating_sub(gap) {
            overlaps.push(jaccard(&sets[i], &sets[i + gap]));
        }
    }
    let topic = overlaps.iter().sum::<f64>() / overlaps.len() as f64;

    let followers = &sentences[1..];
    let hits = followers.iter().filter(|s| has_marker(s)).count();
    let marker_rate = hits as f64 / followers.len() as f64;

    let combined = 0.7 * topic + 0.3 * marker_rate;
    let mut score =
        (1.0 - (combined - COHERENCE_CENTER).abs() / COHERENCE_HALF_WIDTH).clamp(0.0, 1.0);

    if !(0.25..=0.96).contains(&redundancy) {
        score *= 0.9;
    }
    if structure >= 0.85 && word_count >= 600 && structure > score {
        score += (structure - score) * 0.5;
    }
    score.clamp(COHERENCE_FLOOR, 1.0)
}

/// Length target stated in the prompt ("at least N lines|words"), in words.
pub(super) fn target_words(prompt: &str) -> Option<u32> {
    let caps = target_pattern().captures(prompt)?;
    let count: u32 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    let words = if unit.starts_with("line") {
        count.saturating_mul(WORDS_PER_LINE)
    } else {
        count
    };
    Some(words.max(1))
}

#[allow(clippy::cast_precision_loss)]
pub(super) fn length_adequacy(word_count: usize, target_words: u32) -> f64 {
    let ratio = word_count as f64 / f64::from(target_words.max(1));
    (-(ratio - 1.0).powi(2) / 0.25).exp()
}

fn band_score(actual: f64, center: f64) -> f64 {
    (1.0 - (actual - center).abs() / center).clamp(0.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
pub(super) fn readability(words: &[String], sentence_count: usize) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let per_sentence = words.len() as f64 / sentence_count.max(1) as f64;
    let syllable_total: usize = words.iter().map(|w| syllables(w)).sum();
    let density = syllable_total as f64 / words.len() as f64;

    (band_score(per_sentence, SENTENCE_LENGTH_CENTER)
        + band_score(density, SYLLABLE_DENSITY_CENTER))
        / 2.0
}
