//! Repository trait - persistence seam for experiments, runs, responses and metrics

use std::future::Future;

use super::{ExperimentRecord, MetricRecord, ResponseRecord, RunRecord, RunStatus};
use crate::Result;

/// Async persistence interface used by the orchestrator.
///
/// Implementations must reject rows whose parent does not exist with
/// [`crate::Error::NotFound`]: a run needs its experiment, a response its run
/// and a metric its response.
pub trait Repository: Send + Sync {
    /// Insert an experiment.
    fn create_experiment(
        &self,
        experiment: ExperimentRecord,
    ) -> impl Future<Output = Result<ExperimentRecord>> + Send;

    /// Load an experiment by ID.
    fn get_experiment(
        &self,
        experiment_id: &str,
    ) -> impl Future<Output = Result<ExperimentRecord>> + Send;

    /// All experiments, oldest first.
    fn list_experiments(&self) -> impl Future<Output = Result<Vec<ExperimentRecord>>> + Send;

    /// Insert a run for an existing experiment.
    fn create_run(&self, run: RunRecord) -> impl Future<Output = Result<RunRecord>> + Send;

    /// Load a run by ID.
    fn get_run(&self, run_id: &str) -> impl Future<Output = Result<RunRecord>> + Send;

    /// Move a run to a terminal status, returning the updated row.
    ///
    /// `error` is recorded only for [`RunStatus::Failed`].
    fn update_run_status(
        &self,
        run_id: &str,
        status: RunStatus,
        error: Option<String>,
    ) -> impl Future<Output = Result<RunRecord>> + Send;

    /// Runs of an experiment, oldest first.
    fn list_runs(&self, experiment_id: &str)
        -> impl Future<Output = Result<Vec<RunRecord>>> + Send;

    /// Insert a response for an existing run.
    fn create_response(
        &self,
        response: ResponseRecord,
    ) -> impl Future<Output = Result<ResponseRecord>> + Send;

    /// Responses of a run in work-unit order.
    fn list_responses(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<Vec<ResponseRecord>>> + Send;

    /// Insert the metric of an existing response.
    fn create_metric(&self, metric: MetricRecord)
        -> impl Future<Output = Result<MetricRecord>> + Send;

    /// Metric attached to a response, if it was scored.
    fn get_metric(
        &self,
        response_id: &str,
    ) -> impl Future<Output = Result<Option<MetricRecord>>> + Send;
}
