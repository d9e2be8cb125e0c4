//! In-memory repository using `DashMap`.
//!
//! This is the default backend - data is lost on process restart.

use dashmap::DashMap;

use super::{ExperimentRecord, MetricRecord, Repository, ResponseRecord, RunRecord, RunStatus};
use crate::{Error, Result};

/// In-memory repository backed by lock-free concurrent hashmaps.
///
/// Thread-safe; concurrent runs write to disjoint rows so no cross-run lock
/// is needed. Metrics are keyed by response ID (1:1).
///
/// # Example
///
/// ```rust
/// use gridlab::experiment::{ExperimentRecord, MemoryRepository, Repository};
///
/// # async fn example() -> gridlab::Result<()> {
/// let repo = MemoryRepository::new();
/// repo.create_experiment(ExperimentRecord::new("exp-1", "Ledgers", "Explain ledgers", "m"))
///     .await?;
/// assert_eq!(repo.get_experiment("exp-1").await?.title(), "Ledgers");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryRepository {
    experiments: DashMap<String, ExperimentRecord>,
    runs: DashMap<String, RunRecord>,
    responses: DashMap<String, ResponseRecord>,
    metrics: DashMap<String, MetricRecord>,
}

impl MemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the repository holds no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
            && self.runs.is_empty()
            && self.responses.is_empty()
            && self.metrics.is_empty()
    }

    /// Get the number of experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Get the number of responses.
    #[must_use]
    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    /// Get the number of metrics.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Remove every row.
    pub fn clear(&self) {
        self.metrics.clear();
        self.responses.clear();
        self.runs.clear();
        self.experiments.clear();
    }
}

impl Repository for MemoryRepository {
    async fn create_experiment(&self, experiment: ExperimentRecord) -> Result<ExperimentRecord> {
        self.experiments
            .insert(experiment.experiment_id().to_string(), experiment.clone());
        Ok(experiment)
    }

    async fn get_experiment(&self, experiment_id: &str) -> Result<ExperimentRecord> {
        self.experiments
            .get(experiment_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::not_found("experiment", experiment_id))
    }

    async fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        let mut experiments: Vec<ExperimentRecord> =
            self.experiments.iter().map(|e| e.value().clone()).collect();
        experiments.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.experiment_id().cmp(b.experiment_id()))
        });
        Ok(experiments)
    }

    async fn create_run(&self, run: RunRecord) -> Result<RunRecord> {
        if !self.experiments.contains_key(run.experiment_id()) {
            return Err(Error::not_found("experiment", run.experiment_id()));
        }
        self.runs.insert(run.run_id().to_string(), run.clone());
        Ok(run)
    }

    async fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.runs
            .get(run_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::not_found("run", run_id))
    }

    async fn update_run_status(
        &self,
        run_id: &str,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<RunRecord> {
        let mut run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::not_found("run", run_id))?;
        run.transition(status, error)?;
        Ok(run.clone())
    }

    async fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        let mut runs: Vec<RunRecord> = self
            .runs
            .iter()
            .filter(|r| r.experiment_id() == experiment_id)
            .map(|r| r.value().clone())
            .collect();
        runs.sort_by(|a, b| {
            a.started_at()
                .cmp(&b.started_at())
                .then_with(|| a.run_id().cmp(b.run_id()))
        });
        Ok(runs)
    }

    async fn create_response(&self, response: ResponseRecord) -> Result<ResponseRecord> {
        if !self.runs.contains_key(response.run_id()) {
            return Err(Error::not_found("run", response.run_id()));
        }
        self.responses
            .insert(response.response_id().to_string(), response.clone());
        Ok(response)
    }

    async fn list_responses(&self, run_id: &str) -> Result<Vec<ResponseRecord>> {
        let mut responses: Vec<ResponseRecord> = self
            .responses
            .iter()
            .filter(|r| r.run_id() == run_id)
            .map(|r| r.value().clone())
            .collect();
        responses.sort_by_key(ResponseRecord::sequence);
        Ok(responses)
    }

    async fn create_metric(&self, metric: MetricRecord) -> Result<MetricRecord> {
        if !self.responses.contains_key(metric.response_id()) {
            return Err(Error::not_found("response", metric.response_id()));
        }
        self.metrics
            .insert(metric.response_id().to_string(), metric.clone());
        Ok(metric)
    }

    async fn get_metric(&self, response_id: &str) -> Result<Option<MetricRecord>> {
        Ok(self.metrics.get(response_id).map(|m| m.value().clone()))
    }
}
