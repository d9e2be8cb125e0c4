//! Experiment Record - immutable template a run executes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grid::GridSpec;

/// Experiment Record: a prompt, a model and the grid to sweep.
///
/// This is the root entity of the schema. Runs reference it; the orchestrator
/// only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRecord {
    experiment_id: String,
    title: String,
    prompt: String,
    model: String,
    grid_spec: GridSpec,
    created_at: DateTime<Utc>,
}

impl ExperimentRecord {
    /// Create a new experiment with an empty grid (all dimensions defaulted).
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - Unique identifier for the experiment
    /// * `title` - Human-readable title
    /// * `prompt` - Raw user prompt sent (elaborated) to every generation
    /// * `model` - Model identifier passed to the gateway
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        title: impl Into<String>,
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        ExperimentRecordBuilder::new(experiment_id, title, prompt, model).build()
    }

    /// Create a builder for constructing an experiment record with optional fields.
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        title: impl Into<String>,
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(experiment_id, title, prompt, model)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experiment title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Get the raw prompt.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Get the model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the declared grid.
    #[must_use]
    pub const fn grid_spec(&self) -> &GridSpec {
        &self.grid_spec
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    experiment_id: String,
    title: String,
    prompt: String,
    model: String,
    grid_spec: GridSpec,
    created_at: DateTime<Utc>,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        title: impl Into<String>,
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            title: title.into(),
            prompt: prompt.into(),
            model: model.into(),
            grid_spec: GridSpec::default(),
            created_at: Utc::now(),
        }
    }

    /// Set the grid to sweep.
    #[must_use]
    pub fn grid_spec(mut self, grid_spec: GridSpec) -> Self {
        self.grid_spec = grid_spec;
        self
    }

    /// Set a custom creation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Build the `ExperimentRecord`.
    #[must_use]
    pub fn build(self) -> ExperimentRecord {
        ExperimentRecord {
            experiment_id: self.experiment_id,
            title: self.title,
            prompt: self.prompt,
            model: self.model,
            grid_spec: self.grid_spec,
            created_at: self.created_at,
        }
    }
}
