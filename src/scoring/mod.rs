//! Heuristic quality scoring
//!
//! Seven independent sub-scores, each in `[0, 1]`, combined with fixed weights
//! into a single `overall_quality` used to rank responses:
//!
//! | sub-score           | weight |
//! |---------------------|--------|
//! | completeness        | 0.22   |
//! | structure           | 0.15   |
//! | coherence           | 0.18   |
//! | redundancy          | 0.12   |
//! | lexical_diversity   | 0.10   |
//! | length_adequacy     | 0.13   |
//! | readability         | 0.10   |
//!
//! Scoring depends on text only: no I/O, no clock, no randomness.
//!
//! ```rust
//! use gridlab::scoring::QualityScorer;
//!
//! let scorer = QualityScorer::new();
//! let card = scorer.compute("Explain ledgers", "## Ledgers\n- A ledger records entries.");
//! assert!((0.0..=1.0).contains(&card.overall_quality));
//! ```

mod metrics;
mod remote;
mod summary;

#[cfg(feature = "http")]
pub use remote::HttpRemoteScorer;
pub use remote::RemoteScorer;

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::text::{content_words, sentences, tokenize};

/// Version tag written to every metric produced by the local scorer.
pub const SCORER_VERSION: &str = "heuristic-v1";

/// Answer length assumed when the prompt does not ask for one.
pub const DEFAULT_TARGET_WORDS: u32 = 350;

/// Prompt keywords checked for completeness.
pub const COMPLETENESS_KEYWORDS: usize = 15;

/// Composite weights, in [`Scores::iter`] order. Sum to 1.0.
pub const WEIGHTS: [f64; 7] = [0.22, 0.15, 0.18, 0.12, 0.10, 0.13, 0.10];

/// The seven sub-scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    /// Share of prompt keywords covered.
    pub completeness: f64,
    /// Headings, list markers and line-break density.
    pub structure: f64,
    /// Topic continuity between nearby sentences.
    pub coherence: f64,
    /// Absence of repeated 4-grams (higher is better).
    pub redundancy: f64,
    /// Unique-to-total content word ratio.
    pub lexical_diversity: f64,
    /// Closeness to the requested length.
    pub length_adequacy: f64,
    /// Sentence length and syllable density.
    pub readability: f64,
}

impl Scores {
    /// Sub-scores by name, in weight order.
    #[must_use]
    pub const fn iter(&self) -> [(&'static str, f64); 7] {
        [
            ("completeness", self.completeness),
            ("structure", self.structure),
            ("coherence", self.coherence),
            ("redundancy", self.redundancy),
            ("lexical_diversity", self.lexical_diversity),
            ("length_adequacy", self.length_adequacy),
            ("readability", self.readability),
        ]
    }

    /// Look up a sub-score by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.iter()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Weighted composite, clamped to `[0, 1]`.
    #[must_use]
    pub fn overall(&self) -> f64 {
        let sum: f64 = self
            .iter()
            .iter()
            .zip(WEIGHTS)
            .map(|((_, value), weight)| value * weight)
            .sum();
        sum.clamp(0.0, 1.0)
    }
}

/// Diagnostic payload stored next to the scores.
///
/// Every field is optional on the wire: a remote scorer may send any subset,
/// and keys this struct does not know are kept in [`ScoreDetails::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreDetails {
    /// Word tokens in the response.
    pub token_count: usize,
    /// Word tokens after stop-word removal.
    pub content_token_count: usize,
    /// Sentences detected.
    pub sentence_count: usize,
    /// Non-empty lines.
    pub line_count: usize,
    /// Prompt keywords found in the response.
    pub matched_keywords: Vec<String>,
    /// Prompt keywords absent from the response.
    pub missed_keywords: Vec<String>,
    /// Content-word 4-grams.
    pub total_4grams: usize,
    /// 4-grams that repeat an earlier one.
    pub repeated_4grams: usize,
    /// Length target the response was measured against.
    pub target_words: u32,
    /// Set when the local scorer stood in for an unavailable remote scorer.
    pub fallback: bool,
    /// Two or three sentence human-readable diagnosis.
    pub summary: String,
    /// Diagnostics reported by a remote scorer under other keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Full result of scoring one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    /// Weighted composite in `[0, 1]`.
    pub overall_quality: f64,
    /// Individual sub-scores.
    pub scores: Scores,
    /// Diagnostics.
    pub details: ScoreDetails,
}

impl ScoreCard {
    /// Mark this card as a stand-in for a remote computation.
    #[must_use]
    pub fn into_fallback(mut self) -> Self {
        self.details.fallback = true;
        self
    }
}

/// Local heuristic scorer.
#[derive(Debug, Clone, Copy)]
pub struct QualityScorer {
    default_target_words: u32,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityScorer {
    /// Scorer with the default length target.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_target_words: DEFAULT_TARGET_WORDS,
        }
    }

    /// Scorer with a different fallback length target (used when the prompt
    /// does not state one).
    #[must_use]
    pub const fn with_default_target(words: u32) -> Self {
        Self {
            default_target_words: if words == 0 { 1 } else { words },
        }
    }

    /// Version tag for metrics produced by this scorer.
    #[must_use]
    pub const fn version(&self) -> &'static str {
        SCORER_VERSION
    }

    /// Score `text` as an answer to `prompt`.
    #[must_use]
    pub fn compute(&self, prompt: &str, text: &str) -> ScoreCard {
        let words = tokenize(text);
        let content = content_words(text);
        let sentence_list = sentences(text);
        let token_set: FxHashSet<&str> = words.iter().map(String::as_str).collect();

        let keywords = metrics::top_keywords(prompt, COMPLETENESS_KEYWORDS);
        let coverage = metrics::completeness(&keywords, &token_set);
        let structure = metrics::structure(text);
        let repetition = metrics::redundancy(&content);
        let lexical_diversity = metrics::lexical_diversity(&content);
        let coherence = metrics::coherence(
            &sentence_list,
            repetition.score,
            structure,
            words.len(),
        );
        let target_words = metrics::target_words(prompt).unwrap_or(self.default_target_words);
        let length_adequacy = metrics::length_adequacy(words.len(), target_words);
        let readability = metrics::readability(&words, sentence_list.len());

        let scores = Scores {
            completeness: coverage.score,
            structure,
            coherence,
            redundancy: repetition.score,
            lexical_diversity,
            length_adequacy,
            readability,
        };
        let overall_quality = scores.overall();

        let details = ScoreDetails {
            token_count: words.len(),
            content_token_count: content.len(),
            sentence_count: sentence_list.len(),
            line_count: text.lines().filter(|l| !l.trim().is_empty()).count(),
            summary: summary::describe(overall_quality, &scores, &coverage.missed),
            matched_keywords: coverage.matched,
            missed_keywords: coverage.missed,
            total_4grams: repetition.total,
            repeated_4grams: repetition.repeated,
            target_words,
            fallback: false,
            extra: BTreeMap::new(),
        };

        ScoreCard {
            overall_quality,
            scores,
            details,
        }
    }
}
