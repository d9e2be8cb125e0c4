//! Grid merge and cartesian expansion

use super::{GridSpec, ParameterSet};
use crate::Result;

const DEFAULT_TEMPERATURES: [f64; 4] = [0.0, 0.3, 0.6, 0.9];
const DEFAULT_TOP_P: [f64; 2] = [0.7, 0.9];
const DEFAULT_MAX_TOKENS: [u32; 1] = [256];

/// Shallow field-wise override of `base` by `override_grid`.
///
/// Declared override dimensions replace the base dimension wholesale (no
/// concatenation); undeclared ones carry over.
#[must_use]
pub fn merge(base: &GridSpec, override_grid: Option<&GridSpec>) -> GridSpec {
    let Some(over) = override_grid else {
        return base.clone();
    };

    GridSpec {
        temperature: over.temperature.clone().or_else(|| base.temperature.clone()),
        top_p: over.top_p.clone().or_else(|| base.top_p.clone()),
        top_k: over.top_k.clone().or_else(|| base.top_k.clone()),
        max_tokens: over.max_tokens.clone().or_else(|| base.max_tokens.clone()),
        presence_penalty: over
            .presence_penalty
            .clone()
            .or_else(|| base.presence_penalty.clone()),
        frequency_penalty: over
            .frequency_penalty
            .clone()
            .or_else(|| base.frequency_penalty.clone()),
        samples: over.samples.or(base.samples),
        seed: over.seed.or(base.seed),
    }
}

/// Expand a grid into its ordered cartesian product.
///
/// Absent `top_k` and penalty dimensions contribute a single combination with
/// the field omitted. A fixed seed is carried by every set; otherwise every set
/// has `seed == None`.
///
/// # Errors
///
/// Returns [`crate::Error::Validation`] if the grid is structurally invalid.
pub fn expand(model: &str, grid: &GridSpec) -> Result<Vec<ParameterSet>> {
    grid.validate()?;

    let temperatures = grid.temperature.as_deref().unwrap_or(&DEFAULT_TEMPERATURES[..]);
    let top_ps = grid.top_p.as_deref().unwrap_or(&DEFAULT_TOP_P[..]);
    let top_ks = optional_dimension(grid.top_k.as_deref());
    let budgets = grid.max_tokens.as_deref().unwrap_or(&DEFAULT_MAX_TOKENS[..]);
    let presence = optional_dimension(grid.presence_penalty.as_deref());
    let frequency = optional_dimension(grid.frequency_penalty.as_deref());
    let seed = grid.fixed_seed();

    let capacity = temperatures.len()
        * top_ps.len()
        * top_ks.len()
        * budgets.len()
        * presence.len()
        * frequency.len();
    let mut sets = Vec::with_capacity(capacity);

    for &temperature in temperatures {
        for &top_p in top_ps {
            for &top_k in &top_ks {
                for &max_tokens in budgets {
                    for &presence_penalty in &presence {
                        for &frequency_penalty in &frequency {
                            sets.push(ParameterSet {
                                model: model.to_string(),
                                temperature,
                                top_p,
                                top_k,
                                max_tokens,
                                presence_penalty,
                                frequency_penalty,
                                seed,
                            });
                        }
                    }
                }
            }
        }
    }

    Ok(sets)
}

/// Total units of work a grid produces: combinations × samples.
///
/// # Errors
///
/// Returns [`crate::Error::Validation`] if the grid is structurally invalid.
pub fn work_units(model: &str, grid: &GridSpec) -> Result<usize> {
    let combos = expand(model, grid)?.len();
    Ok(combos * grid.samples_or_default() as usize)
}

fn optional_dimension<T: Copy>(values: Option<&[T]>) -> Vec<Option<T>> {
    values.map_or_else(|| vec![None], |v| v.iter().copied().map(Some).collect())
}
