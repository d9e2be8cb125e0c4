//! Flattened export of experiment results
//!
//! One row per response, carrying its experiment, run, parameters, telemetry,
//! metric and text. Rows serialize straight to CSV (header from the field
//! names) or JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::experiment::{ExperimentRecord, MetricRecord, Repository, ResponseRecord, RunRecord};
use crate::{Error, Result};

/// One exported response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    /// Experiment ID
    pub experiment_id: String,
    /// Experiment title
    pub experiment_title: String,
    /// Model the experiment targets
    pub experiment_model: String,
    /// Raw prompt
    pub experiment_prompt: String,
    /// When the experiment was created
    pub experiment_created_at: DateTime<Utc>,

    /// Run ID
    pub run_id: String,
    /// Status of the run at export time
    pub run_status: String,
    /// When the run started
    pub run_started_at: DateTime<Utc>,
    /// When the run reached a terminal state
    pub run_completed_at: Option<DateTime<Utc>>,

    /// Response ID
    pub response_id: String,
    /// When the response was stored
    pub response_created_at: DateTime<Utc>,
    /// Work-unit index within the run
    pub sequence: usize,
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus threshold
    pub top_p: f64,
    /// Top-k cutoff, if sent
    pub top_k: Option<u32>,
    /// Token budget
    pub max_tokens: u32,
    /// Presence penalty, if sent
    pub presence_penalty: Option<f64>,
    /// Frequency penalty, if sent
    pub frequency_penalty: Option<f64>,
    /// Seed sent
    pub seed: Option<u64>,
    /// Prompt tokens
    pub tokens_in: u32,
    /// Completion tokens
    pub tokens_out: u32,
    /// Call latency
    pub latency_ms: u64,

    /// Composite score, if scored
    pub overall_quality: Option<f64>,
    /// Prompt keyword coverage
    pub completeness: Option<f64>,
    /// Headings, lists and line breaks
    pub structure: Option<f64>,
    /// Topical continuity
    pub coherence: Option<f64>,
    /// Absence of repeated 4-grams
    pub redundancy: Option<f64>,
    /// Vocabulary variety
    pub lexical_diversity: Option<f64>,
    /// Closeness to the length target
    pub length_adequacy: Option<f64>,
    /// Sentence length and syllable density
    pub readability: Option<f64>,
    /// Whether the local scorer stood in for the remote one
    pub fallback: Option<bool>,
    /// Scorer that produced the metric
    pub scorer_version: Option<String>,
    /// Scoring diagnostics as compact JSON, empty when unscored
    pub details: String,

    /// Generated text
    pub response_text: String,
}

impl ExportRow {
    fn new(
        experiment: &ExperimentRecord,
        run: &RunRecord,
        response: &ResponseRecord,
        metric: Option<&MetricRecord>,
    ) -> Result<Self> {
        let params = response.params();
        let scores = metric.map(MetricRecord::scores);
        let details = match metric {
            Some(m) => serde_json::to_string(m.details())?,
            None => String::new(),
        };

        Ok(Self {
            experiment_id: experiment.experiment_id().to_string(),
            experiment_title: experiment.title().to_string(),
            experiment_model: experiment.model().to_string(),
            experiment_prompt: experiment.prompt().to_string(),
            experiment_created_at: experiment.created_at(),
            run_id: run.run_id().to_string(),
            run_status: run.status().to_string(),
            run_started_at: run.started_at(),
            run_completed_at: run.completed_at(),
            response_id: response.response_id().to_string(),
            response_created_at: response.created_at(),
            sequence: response.sequence(),
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_tokens: params.max_tokens,
            presence_penalty: params.presence_penalty,
            frequency_penalty: params.frequency_penalty,
            seed: params.seed,
            tokens_in: response.tokens_in(),
            tokens_out: response.tokens_out(),
            latency_ms: response.latency_ms(),
            overall_quality: metric.map(MetricRecord::overall_quality),
            completeness: scores.map(|s| s.completeness),
            structure: scores.map(|s| s.structure),
            coherence: scores.map(|s| s.coherence),
            redundancy: scores.map(|s| s.redundancy),
            lexical_diversity: scores.map(|s| s.lexical_diversity),
            length_adequacy: scores.map(|s| s.length_adequacy),
            readability: scores.map(|s| s.readability),
            fallback: metric.map(MetricRecord::is_fallback),
            scorer_version: metric.map(|m| m.scorer_version().to_string()),
            details,
            response_text: response.text().to_string(),
        })
    }
}

/// Rows for every response of every run of an experiment, runs oldest
/// first, responses in work-unit order.
///
/// # Errors
///
/// Returns [`crate::Error::NotFound`] if the experiment does not exist.
pub async fn collect_rows<R: Repository>(
    repository: &R,
    experiment_id: &str,
) -> Result<Vec<ExportRow>> {
    let experiment = repository.get_experiment(experiment_id).await?;
    let mut rows = Vec::new();
    append_rows(repository, &experiment, &mut rows).await?;
    Ok(rows)
}

/// Rows for every response of every experiment, experiments oldest first.
///
/// # Errors
///
/// Propagates repository errors.
pub async fn collect_all_rows<R: Repository>(repository: &R) -> Result<Vec<ExportRow>> {
    let mut rows = Vec::new();
    for experiment in repository.list_experiments().await? {
        append_rows(repository, &experiment, &mut rows).await?;
    }
    Ok(rows)
}

async fn append_rows<R: Repository>(
    repository: &R,
    experiment: &ExperimentRecord,
    rows: &mut Vec<ExportRow>,
) -> Result<()> {
    for run in repository.list_runs(experiment.experiment_id()).await? {
        for response in repository.list_responses(run.run_id()).await? {
            let metric = repository.get_metric(response.response_id()).await?;
            rows.push(ExportRow::new(experiment, &run, &response, metric.as_ref())?);
        }
    }
    Ok(())
}

/// Render rows as CSV. The header line is written with the first row, so no
/// rows yield an empty string.
///
/// # Errors
///
/// Returns [`crate::Error::Csv`] if a row cannot be encoded.
pub fn to_csv(rows: &[ExportRow]) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new().from_writer(Vec::new());
    for row in rows {
        wtr.serialize(row)?;
    }
    let bytes = wtr.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Render rows as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns [`crate::Error::Serialization`] if encoding fails.
pub fn to_json(rows: &[ExportRow]) -> Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}
