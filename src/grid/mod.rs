//! Parameter grids - declarative search spaces and their concrete points
//!
//! A [`GridSpec`] names one sequence of values per generation dimension. The
//! expander turns it into an ordered list of [`ParameterSet`]s:
//!
//! ```text
//! temperature × top_p × top_k × max_tokens × presence_penalty × frequency_penalty × seed
//! (outermost)                                                               (innermost)
//! ```
//!
//! The nesting order is part of the public contract: it fixes the order in which
//! responses are created and progress events are observed.
//!
//! ## Usage
//!
//! ```rust
//! use gridlab::grid::{expand, merge, GridSpec};
//!
//! let base = GridSpec {
//!     temperature: Some(vec![0.1, 0.2]),
//!     top_p: Some(vec![0.8]),
//!     ..GridSpec::default()
//! };
//! let override_grid = GridSpec {
//!     temperature: Some(vec![0.9]),
//!     ..GridSpec::default()
//! };
//!
//! let merged = merge(&base, Some(&override_grid));
//! let sets = expand("llama-3.3-70b-versatile", &merged)?;
//! assert_eq!(sets.len(), 1);
//! # Ok::<(), gridlab::Error>(())
//! ```

mod expand;

pub use expand::{expand, merge, work_units};

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Replicate count used when a grid does not declare `samples`.
pub const DEFAULT_SAMPLES: u32 = 2;

/// Largest replicate count a grid may request.
pub const MAX_SAMPLES: u32 = 10;

/// Declarative search space: one optional sequence per dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Sampling temperatures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Vec<f64>>,

    /// Nucleus sampling thresholds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<Vec<f64>>,

    /// Top-k cutoffs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<Vec<u32>>,

    /// Completion token budgets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Vec<u32>>,

    /// Presence penalties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<Vec<f64>>,

    /// Frequency penalties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<Vec<f64>>,

    /// Replicate generations per parameter combination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<u32>,

    /// Seed policy. The outer `Option` tracks whether the field was given at
    /// all; `Some(None)` is an explicit `null` ("assign per sample"), which
    /// still replaces a base seed when merged as an override.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "explicit_seed"
    )]
    pub seed: Option<Option<u64>>,
}

fn explicit_seed<'de, D>(deserializer: D) -> std::result::Result<Option<Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(Some)
}

impl GridSpec {
    /// Replicate count, defaulting to [`DEFAULT_SAMPLES`].
    #[must_use]
    pub fn samples_or_default(&self) -> u32 {
        self.samples.unwrap_or(DEFAULT_SAMPLES)
    }

    /// The seed held fixed across every combination, if any.
    #[must_use]
    pub fn fixed_seed(&self) -> Option<u64> {
        self.seed.flatten()
    }

    /// Check structural validity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a declared dimension is empty, holds a
    /// non-finite or out-of-range value, or `samples` is outside `1..=10`.
    pub fn validate(&self) -> Result<()> {
        check_floats("temperature", self.temperature.as_deref(), |v| v >= 0.0)?;
        check_floats("top_p", self.top_p.as_deref(), |v| v > 0.0 && v <= 1.0)?;
        check_floats("presence_penalty", self.presence_penalty.as_deref(), |_| true)?;
        check_floats("frequency_penalty", self.frequency_penalty.as_deref(), |_| true)?;
        check_ints("top_k", self.top_k.as_deref(), |_| true)?;
        check_ints("max_tokens", self.max_tokens.as_deref(), |v| v > 0)?;

        if let Some(samples) = self.samples {
            if !(1..=MAX_SAMPLES).contains(&samples) {
                return Err(Error::Validation(format!(
                    "samples must be between 1 and {MAX_SAMPLES}, got {samples}"
                )));
            }
        }
        Ok(())
    }
}

fn check_floats(name: &str, values: Option<&[f64]>, in_range: impl Fn(f64) -> bool) -> Result<()> {
    let Some(values) = values else {
        return Ok(());
    };
    if values.is_empty() {
        return Err(Error::Validation(format!("{name} must not be empty")));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || !in_range(**v)) {
        return Err(Error::Validation(format!("{name} value out of range: {bad}")));
    }
    Ok(())
}

fn check_ints(name: &str, values: Option<&[u32]>, in_range: impl Fn(u32) -> bool) -> Result<()> {
    let Some(values) = values else {
        return Ok(());
    };
    if values.is_empty() {
        return Err(Error::Validation(format!("{name} must not be empty")));
    }
    if let Some(bad) = values.iter().find(|v| !in_range(**v)) {
        return Err(Error::Validation(format!("{name} value out of range: {bad}")));
    }
    Ok(())
}

/// One concrete generation configuration.
///
/// `seed == None` means the caller must assign a seed before use; it is
/// serialized as `null` rather than omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling threshold.
    pub top_p: f64,
    /// Top-k cutoff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Completion token budget.
    pub max_tokens: u32,
    /// Presence penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Frequency penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Seed, or `None` until resolved.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ParameterSet {
    /// Copy of this set with the seed resolved.
    #[must_use]
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self.clone()
        }
    }
}
