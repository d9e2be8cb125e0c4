//! Runtime configuration
//!
//! Settings come from a TOML file, the environment, or both (environment
//! wins). Every field has a default, so an empty file is a valid config that
//! runs against the mock gateway.
//!
//! | variable                           | field                     |
//! |------------------------------------|---------------------------|
//! | `GRIDLAB_MODEL`                    | `model`                   |
//! | `GRIDLAB_PROVIDER`                 | `provider`                |
//! | `GRIDLAB_PROVIDER_URL`             | `provider_base_url`       |
//! | `GRIDLAB_API_KEY`, `GROQ_API_KEY`  | `api_key`                 |
//! | `GRIDLAB_GENERATION_TIMEOUT_SECS`  | `generation_timeout_secs` |
//! | `GRIDLAB_METRICS_URL`, `METRICS_SERVICE_URL` | `metrics_service_url` |
//! | `GRIDLAB_SCORING_TIMEOUT_MS`       | `scoring_timeout_ms`      |
//! | `GRIDLAB_QUALITY_MODE`             | `quality_mode`            |
//! | `GRIDLAB_MIN_TOKEN_BUDGET`         | `min_token_budget`        |
//! | `GRIDLAB_TARGET_WORDS`             | `target_words`            |
//! | `GRIDLAB_KEEP_ALIVE_SECS`          | `keep_alive_secs`         |
//! | `GRIDLAB_EVENT_CAPACITY`           | `event_capacity`          |
//! | `GRIDLAB_MASTER_SEED`              | `master_seed`             |
//! | `GRIDLAB_MOCK_LATENCY_MS`          | `mock_latency_ms`         |

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::DEFAULT_CAPACITY;
use crate::orchestrator::DEFAULT_MIN_TOKEN_BUDGET;
use crate::prompt::QualityMode;
use crate::scoring::{QualityScorer, DEFAULT_TARGET_WORDS};
use crate::{Error, Result};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// OpenAI-compatible endpoint used when none is configured.
pub const DEFAULT_PROVIDER_URL: &str = "https://api.groq.com/openai/v1";

/// Which generation backend to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deterministic offline backend
    #[default]
    Mock,
    /// OpenAI-compatible HTTP backend
    Http,
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "http" | "groq" | "openai" => Ok(Self::Http),
            other => Err(Error::Config(format!("unknown provider: {other}"))),
        }
    }
}

/// gridlab configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model for new experiments
    pub model: String,

    /// Generation backend
    pub provider: ProviderKind,

    /// Base URL of the OpenAI-compatible API
    pub provider_base_url: String,

    /// Bearer token for the HTTP provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-call generation timeout
    pub generation_timeout_secs: u64,

    /// Remote metrics service; local scoring only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_service_url: Option<String>,

    /// Bound on one remote scoring call
    pub scoring_timeout_ms: u64,

    /// Prompt elaboration mode
    pub quality_mode: QualityMode,

    /// Token budget enforced when a grid leaves `max_tokens` undeclared
    pub min_token_budget: u32,

    /// Answer length the scorer expects when a prompt states none
    pub target_words: u32,

    /// SSE keep-alive period
    pub keep_alive_secs: u64,

    /// Events buffered per subscriber
    pub event_capacity: usize,

    /// Reproducible per-replicate seeds when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_seed: Option<u64>,

    /// Simulated latency of the mock gateway
    pub mock_latency_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider: ProviderKind::Mock,
            provider_base_url: DEFAULT_PROVIDER_URL.to_string(),
            api_key: None,
            generation_timeout_secs: 60,
            metrics_service_url: None,
            scoring_timeout_ms: 5_000,
            quality_mode: QualityMode::Strong,
            min_token_budget: DEFAULT_MIN_TOKEN_BUDGET,
            target_words: DEFAULT_TARGET_WORDS,
            keep_alive_secs: 15,
            event_capacity: DEFAULT_CAPACITY,
            master_seed: None,
            mock_latency_ms: 0,
        }
    }
}

impl Config {
    /// Parse a TOML document; absent keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid TOML for this schema.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Load a TOML file, apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, [`Error::Config`] if
    /// it cannot be parsed or the result is inconsistent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?.with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment, validated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed or the result
    /// is inconsistent.
    pub fn from_env() -> Result<Self> {
        let config = Self::default().with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// An API key switches the provider to HTTP unless `GRIDLAB_PROVIDER`
    /// says otherwise. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed.
    pub fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        };

        if let Some(model) = var(&["GRIDLAB_MODEL"]) {
            self.model = model;
        }
        if let Some(url) = var(&["GRIDLAB_PROVIDER_URL"]) {
            self.provider_base_url = url;
        }
        if let Some(key) = var(&["GRIDLAB_API_KEY", "GROQ_API_KEY"]) {
            self.api_key = Some(key);
            self.provider = ProviderKind::Http;
        }
        if let Some(provider) = var(&["GRIDLAB_PROVIDER"]) {
            self.provider = provider.parse()?;
        }
        if let Some(url) = var(&["GRIDLAB_METRICS_URL", "METRICS_SERVICE_URL"]) {
            self.metrics_service_url = Some(url);
        }
        if let Some(mode) = var(&["GRIDLAB_QUALITY_MODE"]) {
            self.quality_mode = mode.parse()?;
        }
        if let Some(v) = var(&["GRIDLAB_GENERATION_TIMEOUT_SECS"]) {
            self.generation_timeout_secs = parse_var("GRIDLAB_GENERATION_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var(&["GRIDLAB_SCORING_TIMEOUT_MS"]) {
            self.scoring_timeout_ms = parse_var("GRIDLAB_SCORING_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var(&["GRIDLAB_MIN_TOKEN_BUDGET"]) {
            self.min_token_budget = parse_var("GRIDLAB_MIN_TOKEN_BUDGET", &v)?;
        }
        if let Some(v) = var(&["GRIDLAB_TARGET_WORDS"]) {
            self.target_words = parse_var("GRIDLAB_TARGET_WORDS", &v)?;
        }
        if let Some(v) = var(&["GRIDLAB_KEEP_ALIVE_SECS"]) {
            self.keep_alive_secs = parse_var("GRIDLAB_KEEP_ALIVE_SECS", &v)?;
        }
        if let Some(v) = var(&["GRIDLAB_EVENT_CAPACITY"]) {
            self.event_capacity = parse_var("GRIDLAB_EVENT_CAPACITY", &v)?;
        }
        if let Some(v) = var(&["GRIDLAB_MASTER_SEED"]) {
            self.master_seed = Some(parse_var("GRIDLAB_MASTER_SEED", &v)?);
        }
        if let Some(v) = var(&["GRIDLAB_MOCK_LATENCY_MS"]) {
            self.mock_latency_ms = parse_var("GRIDLAB_MOCK_LATENCY_MS", &v)?;
        }

        Ok(self)
    }

    /// Check cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".to_string()));
        }
        if self.provider == ProviderKind::Http {
            if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                return Err(Error::Config(
                    "the http provider requires an API key".to_string(),
                ));
            }
            check_url("provider_base_url", &self.provider_base_url)?;
        }
        if let Some(url) = &self.metrics_service_url {
            check_url("metrics_service_url", url)?;
        }
        if self.generation_timeout_secs == 0 {
            return Err(Error::Config(
                "generation_timeout_secs must be positive".to_string(),
            ));
        }
        if self.scoring_timeout_ms == 0 {
            return Err(Error::Config("scoring_timeout_ms must be positive".to_string()));
        }
        if self.keep_alive_secs == 0 {
            return Err(Error::Config("keep_alive_secs must be positive".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be positive".to_string()));
        }
        if self.min_token_budget == 0 {
            return Err(Error::Config("min_token_budget must be positive".to_string()));
        }
        if self.target_words == 0 {
            return Err(Error::Config("target_words must be positive".to_string()));
        }
        Ok(())
    }

    /// Generation call timeout.
    #[must_use]
    pub const fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Remote scoring timeout.
    #[must_use]
    pub const fn scoring_timeout(&self) -> Duration {
        Duration::from_millis(self.scoring_timeout_ms)
    }

    /// SSE keep-alive period.
    #[must_use]
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Local scorer measuring length against [`Config::target_words`].
    #[must_use]
    pub const fn scorer(&self) -> QualityScorer {
        QualityScorer::with_default_target(self.target_words)
    }

    /// Mock gateway latency.
    #[must_use]
    pub const fn mock_latency(&self) -> Duration {
        Duration::from_millis(self.mock_latency_ms)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{name}: {e}")))
}

fn check_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::Config(format!("{field} must be an http(s) URL: {url}")))
    }
}
