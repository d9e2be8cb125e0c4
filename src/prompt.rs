//! Prompt elaboration - turns a raw user prompt into a structure-enforcing
//! instruction prompt plus generation hints
//!
//! The builder is pure: identical inputs always yield byte-identical output.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text::{is_stop_word, tokenize};
use crate::Error;

/// Maximum keywords lifted from the raw prompt (domain packs come on top).
pub const MAX_PROMPT_KEYWORDS: usize = 18;

const FINTECH_PACK: &[&str] = &[
    "authorization",
    "authentication",
    "PCI-DSS",
    "tokenization",
    "acquiring bank",
    "issuing bank",
    "interchange",
    "chargeback",
    "reconciliation",
    "settlement",
    "ISO 8583",
    "fraud scoring",
    "3-D Secure",
    "risk engine",
    "ledger",
    "webhook",
    "dispute",
    "KYC",
    "AML",
    "orchestration",
    "retry logic",
];

const LLM_PACK: &[&str] = &[
    "prompt engineering",
    "RAG",
    "vector database",
    "BM25",
    "embedding",
    "reranking",
    "grounding",
    "hallucination",
    "evaluation",
    "nDCG@k",
    "Recall@k",
    "chunking",
    "window size",
    "temperature",
    "top_p",
    "streaming",
    "function calling",
];

fn domain_detectors() -> &'static [(Regex, &'static [&'static str])] {
    static DETECTORS: OnceLock<Vec<(Regex, &'static [&'static str])>> = OnceLock::new();
    DETECTORS.get_or_init(|| {
        vec![
            (
                Regex::new(r"fintech|payment|bank|card|wallet|kyc|aml|interchange|issuer|acquirer")
                    .expect("static regex"),
                FINTECH_PACK,
            ),
            (
                Regex::new(r"llm|rag|embedding|vector|bm25|rerank|prompt|token")
                    .expect("static regex"),
                LLM_PACK,
            ),
        ]
    })
}

/// How hard the elaborated prompt pushes for length and structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityMode {
    /// Longest target, most headings/bullets, strongest penalties.
    #[default]
    Strong,
    /// Moderate target.
    Balanced,
    /// Same constraints as balanced.
    Creative,
}

impl QualityMode {
    /// Target line count for the answer.
    #[must_use]
    pub const fn target_lines(self) -> u32 {
        match self {
            Self::Strong => 400,
            Self::Balanced | Self::Creative => 250,
        }
    }

    const fn min_headings(self) -> u32 {
        match self {
            Self::Strong => 10,
            Self::Balanced | Self::Creative => 6,
        }
    }

    const fn min_bullets(self) -> u32 {
        match self {
            Self::Strong => 28,
            Self::Balanced | Self::Creative => 16,
        }
    }

    /// Default presence/frequency penalties.
    #[must_use]
    pub const fn penalties(self) -> Penalties {
        match self {
            Self::Strong => Penalties {
                presence: 0.3,
                frequency: 0.3,
            },
            Self::Balanced | Self::Creative => Penalties {
                presence: 0.1,
                frequency: 0.1,
            },
        }
    }
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strong => "strong",
            Self::Balanced => "balanced",
            Self::Creative => "creative",
        })
    }
}

impl FromStr for QualityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strong" => Ok(Self::Strong),
            "balanced" => Ok(Self::Balanced),
            "creative" => Ok(Self::Creative),
            other => Err(Error::Config(format!("unknown quality mode: {other}"))),
        }
    }
}

/// Penalty defaults exported alongside the elaborated prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Penalties {
    /// Presence penalty.
    pub presence: f64,
    /// Frequency penalty.
    pub frequency: f64,
}

/// Output of [`build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// Instruction prompt sent to the generation backend.
    pub prompt: String,
    /// Penalties to apply where the grid leaves them unset.
    pub penalties: Penalties,
    /// Target answer length in lines.
    pub target_lines: u32,
    /// Keywords the answer should cover, prompt keywords first.
    pub keywords: Vec<String>,
}

/// Keywords from a raw prompt: stop words and tokens of two characters or
/// fewer dropped, first-seen order, at most `cap`.
#[must_use]
pub fn prompt_keywords(raw: &str, cap: usize) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in tokenize(raw) {
        if word.len() <= 2 || is_stop_word(&word) || keywords.contains(&word) {
            continue;
        }
        keywords.push(word);
        if keywords.len() == cap {
            break;
        }
    }
    keywords
}

fn domain_keywords(raw: &str) -> Vec<&'static str> {
    let lower = raw.to_lowercase();
    domain_detectors()
        .iter()
        .filter(|(pattern, _)| pattern.is_match(&lower))
        .flat_map(|(_, pack)| pack.iter().copied())
        .collect()
}

/// Build the elaborated prompt for `raw` under `mode`.
#[must_use]
pub fn build(raw: &str, mode: QualityMode) -> BuiltPrompt {
    let mut keywords = prompt_keywords(raw, MAX_PROMPT_KEYWORDS);
    for extra in domain_keywords(raw) {
        if !keywords.iter().any(|k| k == extra) {
            keywords.push(extra.to_string());
        }
    }

    let target_lines = mode.target_lines();
    let keyword_line = if keywords.is_empty() {
        "- (no extra keywords inferred)".to_string()
    } else {
        format!("- {}", keywords.join(", "))
    };

    let prompt = format!(
        "You are a careful technical writer who optimizes for structure, coherence, readability, and completeness.\n\
         The user asks:\n\
         \"\"\"\n\
         {raw}\n\
         \"\"\"\n\
         Follow the rules strictly:\n\
         \n\
         Produce a **highly structured** answer that **maximizes**:\n\
         - Structure (headings, subheadings, bullet lists)\n\
         - Coherence (logical transitions between adjacent sentences)\n\
         - Readability (short sentences; clear words)\n\
         - Completeness (cover ALL target keywords below)\n\
         - Lexical diversity (avoid repeating phrases; vary sentence starts)\n\
         - Low redundancy (no repeated 4-grams)\n\
         - Length adequacy (aim for about {target_lines} lines)\n\
         \n\
         **Must-follow formatting**\n\
         1) Use at least **{headings}+ headings** (## ..., ### ...) across distinct sections:\n\
         Overview; Key Concepts; Step-by-step Flow; Roles; Data & Fields; Security; Risk/Fraud; Errors/Declines; Fees/Costs; Observability & SLAs; Case Study; FAQs; Summary.\n\
         2) Include at least **{bullets}+ bullet items** spread across the document.\n\
         3) Use explicit transitions between sentences: \"Therefore,\" \"As a result,\" \"Consequently,\" \"Building on this,\" \"However,\" \"Meanwhile,\" etc.\n\
         4) Keep sentences short: **12-18 words**; avoid run-ons.\n\
         5) **Each sentence on its own line** (hard requirement).\n\
         6) Avoid repetitive scaffolding (don't start many sentences with \"First/Next/Finally\").\n\
         7) Use synonyms to prevent repeated phrases; vary sentence openings.\n\
         \n\
         **Target keywords to naturally cover** (do not list them verbatim; weave them in context):\n\
         {keyword_line}\n\
         \n\
         **Deliverables inside the answer**\n\
         - Clear, well-labeled sections and subsections.\n\
         - At least one short, realistic mini case study.\n\
         - A compact summary at the end with 5-8 bullets.",
        headings = mode.min_headings(),
        bullets = mode.min_bullets(),
    );

    BuiltPrompt {
        prompt,
        penalties: mode.penalties(),
        target_lines,
        keywords,
    }
}
