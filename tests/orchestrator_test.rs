//! Run lifecycle tests
//!
//! Drive the orchestrator end to end against the in-memory repository with
//! scripted gateways and scorers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gridlab::events::{ChannelBroadcaster, EventName, RunEvent};
use gridlab::experiment::{
    ExperimentRecord, MemoryRepository, MetricRecord, Repository, ResponseRecord, RunRecord,
    RunStatus,
};
use gridlab::generation::{Generation, GenerationGateway, MockGateway};
use gridlab::grid::{GridSpec, ParameterSet};
use gridlab::orchestrator::{RunOrchestrator, DEFAULT_MIN_TOKEN_BUDGET};
use gridlab::prompt::QualityMode;
use gridlab::scoring::{QualityScorer, RemoteScorer, ScoreCard, SCORER_VERSION};
use gridlab::{Error, Result};
use tokio::sync::broadcast;

const PROMPT: &str = "Explain how double-entry ledgers keep card payment balances consistent";

// =============================================================================
// Test doubles
// =============================================================================

/// Gateway that records what it was sent and fails on a chosen call.
#[derive(Default)]
struct ScriptedGateway {
    calls: AtomicUsize,
    fail_on: Option<usize>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    fn failing_on(call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::default()
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerationGateway for ScriptedGateway {
    async fn generate(&self, prompt: &str, params: &ParameterSet) -> Result<Generation> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail_on == Some(call) {
            return Err(Error::Generation(format!("provider unavailable on call {call}")));
        }
        Ok(Generation {
            text: format!(
                "## Ledgers\n- Every card payment posts a debit and a credit.\n\
                 - Balances stay consistent at temperature {}.\n\
                 Therefore the ledger always balances.",
                params.temperature
            ),
            tokens_in: 12,
            tokens_out: 24,
            latency_ms: 1,
        })
    }
}

struct FailingScorer;

impl RemoteScorer for FailingScorer {
    async fn compute(&self, _prompt: &str, _text: &str) -> Result<ScoreCard> {
        Err(Error::Scoring("connection refused".to_string()))
    }

    fn version(&self) -> &str {
        "remote-v9"
    }
}

struct SlowScorer;

impl RemoteScorer for SlowScorer {
    async fn compute(&self, prompt: &str, text: &str) -> Result<ScoreCard> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(QualityScorer::new().compute(prompt, text))
    }

    fn version(&self) -> &str {
        "remote-slow"
    }
}

/// Remote scorer that works and records the prompts it scored against.
#[derive(Default)]
struct RecordingScorer {
    prompts: Mutex<Vec<String>>,
}

impl RemoteScorer for RecordingScorer {
    async fn compute(&self, prompt: &str, text: &str) -> Result<ScoreCard> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(QualityScorer::new().compute(prompt, text))
    }

    fn version(&self) -> &str {
        "remote-v2"
    }
}

/// Repository whose store refuses to record a completed run.
struct CompletionRejectingRepository {
    inner: MemoryRepository,
}

impl Repository for CompletionRejectingRepository {
    async fn create_experiment(&self, experiment: ExperimentRecord) -> Result<ExperimentRecord> {
        self.inner.create_experiment(experiment).await
    }

    async fn get_experiment(&self, experiment_id: &str) -> Result<ExperimentRecord> {
        self.inner.get_experiment(experiment_id).await
    }

    async fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        self.inner.list_experiments().await
    }

    async fn create_run(&self, run: RunRecord) -> Result<RunRecord> {
        self.inner.create_run(run).await
    }

    async fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.inner.get_run(run_id).await
    }

    async fn update_run_status(
        &self,
        run_id: &str,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<RunRecord> {
        if status == RunStatus::Completed {
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        self.inner.update_run_status(run_id, status, error).await
    }

    async fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        self.inner.list_runs(experiment_id).await
    }

    async fn create_response(&self, response: ResponseRecord) -> Result<ResponseRecord> {
        self.inner.create_response(response).await
    }

    async fn list_responses(&self, run_id: &str) -> Result<Vec<ResponseRecord>> {
        self.inner.list_responses(run_id).await
    }

    async fn create_metric(&self, metric: MetricRecord) -> Result<MetricRecord> {
        self.inner.create_metric(metric).await
    }

    async fn get_metric(&self, response_id: &str) -> Result<Option<MetricRecord>> {
        self.inner.get_metric(response_id).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn repository_with(grid: GridSpec) -> Arc<MemoryRepository> {
    let repository = Arc::new(MemoryRepository::new());
    repository
        .create_experiment(
            ExperimentRecord::builder("exp-1", "Ledgers", PROMPT, "test-model")
                .grid_spec(grid)
                .build(),
        )
        .await
        .unwrap();
    repository
}

fn drain(rx: &mut broadcast::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn count(events: &[RunEvent], name: EventName) -> usize {
    events.iter().filter(|e| e.name == name).count()
}

fn temperatures(values: &[f64]) -> GridSpec {
    GridSpec {
        temperature: Some(values.to_vec()),
        top_p: Some(vec![0.9]),
        samples: Some(1),
        ..GridSpec::default()
    }
}

// =============================================================================
// Successful runs
// =============================================================================

#[tokio::test]
async fn test_run_completes_with_events_in_order() {
    let grid = GridSpec {
        temperature: Some(vec![0.1, 0.2]),
        top_p: Some(vec![0.9]),
        samples: Some(2),
        ..GridSpec::default()
    };
    let repository = repository_with(grid).await;
    let events = Arc::new(ChannelBroadcaster::new(64));
    let mut rx = events.subscribe();

    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(ScriptedGateway::default()),
        Arc::clone(&events),
    )
    .build();

    let run = orchestrator.start("exp-1", None).await.unwrap();
    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(run.total_units(), 4);
    assert!(run.completed_at().is_some());

    let events = drain(&mut rx);
    let names: Vec<EventName> = events.iter().map(|e| e.name).collect();
    let mut expected = vec![EventName::RunStarted];
    for _ in 0..4 {
        expected.extend([
            EventName::ResponseGenerated,
            EventName::MetricsComputed,
            EventName::RunProgress,
        ]);
    }
    expected.push(EventName::RunCompleted);
    assert_eq!(names, expected);

    assert!(events.iter().all(|e| e.run_id == run.run_id()));
    let progress: Vec<usize> = events
        .iter()
        .filter_map(|e| e.progress)
        .map(|p| {
            assert_eq!(p.total, 4);
            p.completed
        })
        .collect();
    assert_eq!(progress, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_responses_follow_expansion_order() {
    let grid = GridSpec {
        temperature: Some(vec![0.1, 0.2]),
        top_p: Some(vec![0.7, 0.9]),
        samples: Some(2),
        ..GridSpec::default()
    };
    let repository = repository_with(grid).await;
    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(ScriptedGateway::default()),
        Arc::new(ChannelBroadcaster::default()),
    )
    .build();

    let run = orchestrator.start("exp-1", None).await.unwrap();
    let responses = repository.list_responses(run.run_id()).await.unwrap();

    let observed: Vec<(f64, f64)> = responses
        .iter()
        .map(|r| (r.params().temperature, r.params().top_p))
        .collect();
    assert_eq!(
        observed,
        vec![
            (0.1, 0.7),
            (0.1, 0.7),
            (0.1, 0.9),
            (0.1, 0.9),
            (0.2, 0.7),
            (0.2, 0.7),
            (0.2, 0.9),
            (0.2, 0.9),
        ]
    );
    for (i, response) in responses.iter().enumerate() {
        assert_eq!(response.sequence(), i);
        let metric = repository
            .get_metric(response.response_id())
            .await
            .unwrap()
            .expect("every response is scored");
        assert_eq!(metric.scorer_version(), SCORER_VERSION);
        assert!(!metric.is_fallback());
    }
}

#[tokio::test]
async fn test_gateway_gets_elaborated_prompt_scorer_gets_raw_prompt() {
    let repository = repository_with(temperatures(&[0.3])).await;
    let gateway = Arc::new(ScriptedGateway::default());
    let scorer = Arc::new(RecordingScorer::default());

    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::clone(&gateway),
        Arc::new(ChannelBroadcaster::default()),
    )
    .remote_scorer(Arc::clone(&scorer))
    .build();

    let run = orchestrator.start("exp-1", None).await.unwrap();

    let sent = gateway.prompts();
    assert_eq!(sent.len(), 1);
    assert_ne!(sent[0], PROMPT);
    assert!(sent[0].contains(PROMPT));

    assert_eq!(*scorer.prompts.lock().unwrap(), vec![PROMPT.to_string()]);

    let response = &repository.list_responses(run.run_id()).await.unwrap()[0];
    let metric = repository
        .get_metric(response.response_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metric.scorer_version(), "remote-v2");
    assert!(!metric.is_fallback());
}

// =============================================================================
// Parameter resolution
// =============================================================================

#[tokio::test]
async fn test_fixed_seed_reused_across_replicates() {
    let grid = GridSpec {
        temperature: Some(vec![0.5]),
        top_p: Some(vec![0.9]),
        samples: Some(3),
        seed: Some(Some(42)),
        ..GridSpec::default()
    };
    let repository = repository_with(grid).await;
    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(ScriptedGateway::default()),
        Arc::new(ChannelBroadcaster::default()),
    )
    .build();

    let run = orchestrator.start("exp-1", None).await.unwrap();
    let seeds: Vec<Option<u64>> = repository
        .list_responses(run.run_id())
        .await
        .unwrap()
        .iter()
        .map(|r| r.params().seed)
        .collect();
    assert_eq!(seeds, vec![Some(42); 3]);
}

#[tokio::test]
async fn test_master_seed_makes_replicate_seeds_reproducible() {
    let grid = GridSpec {
        temperature: Some(vec![0.5]),
        top_p: Some(vec![0.9]),
        samples: Some(4),
        ..GridSpec::default()
    };
    let repository = repository_with(grid).await;

    let mut runs = Vec::new();
    for _ in 0..2 {
        let orchestrator = RunOrchestrator::builder(
            Arc::clone(&repository),
            Arc::new(ScriptedGateway::default()),
            Arc::new(ChannelBroadcaster::default()),
        )
        .master_seed(7)
        .build();
        let run = orchestrator.start("exp-1", None).await.unwrap();
        let seeds: Vec<u64> = repository
            .list_responses(run.run_id())
            .await
            .unwrap()
            .iter()
            .map(|r| r.params().seed.expect("seed resolved"))
            .collect();
        runs.push(seeds);
    }

    assert_eq!(runs[0], runs[1]);
    let mut distinct = runs[0].clone();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(distinct.len(), 4, "replicates draw fresh seeds");
}

#[tokio::test]
async fn test_explicit_null_override_clears_fixed_seed() {
    let grid = GridSpec {
        temperature: Some(vec![0.5]),
        top_p: Some(vec![0.9]),
        samples: Some(2),
        seed: Some(Some(42)),
        ..GridSpec::default()
    };
    let repository = repository_with(grid).await;
    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(ScriptedGateway::default()),
        Arc::new(ChannelBroadcaster::default()),
    )
    .master_seed(1)
    .build();

    let override_grid: GridSpec = serde_json::from_value(serde_json::json!({ "seed": null })).unwrap();
    let run = orchestrator.start("exp-1", Some(&override_grid)).await.unwrap();

    let seeds: Vec<u64> = repository
        .list_responses(run.run_id())
        .await
        .unwrap()
        .iter()
        .map(|r| r.params().seed.unwrap())
        .collect();
    assert_ne!(seeds[0], seeds[1]);
}

#[tokio::test]
async fn test_defaults_fill_penalties_and_budget() {
    let repository = repository_with(temperatures(&[0.3])).await;
    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(ScriptedGateway::default()),
        Arc::new(ChannelBroadcaster::default()),
    )
    .quality_mode(QualityMode::Strong)
    .build();

    let run = orchestrator.start("exp-1", None).await.unwrap();
    let params = repository.list_responses(run.run_id()).await.unwrap()[0]
        .params()
        .clone();

    assert_eq!(params.presence_penalty, Some(0.3));
    assert_eq!(params.frequency_penalty, Some(0.3));
    assert_eq!(params.max_tokens, DEFAULT_MIN_TOKEN_BUDGET);
}

#[tokio::test]
async fn test_declared_values_are_respected() {
    let grid = GridSpec {
        max_tokens: Some(vec![128]),
        presence_penalty: Some(vec![0.0]),
        ..temperatures(&[0.3])
    };
    let repository = repository_with(grid).await;
    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(ScriptedGateway::default()),
        Arc::new(ChannelBroadcaster::default()),
    )
    .quality_mode(QualityMode::Balanced)
    .build();

    let run = orchestrator.start("exp-1", None).await.unwrap();
    let params = repository.list_responses(run.run_id()).await.unwrap()[0]
        .params()
        .clone();

    assert_eq!(params.max_tokens, 128);
    assert_eq!(params.presence_penalty, Some(0.0));
    assert_eq!(params.frequency_penalty, Some(0.1));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_generation_failure_on_third_of_five_units() {
    let repository = repository_with(temperatures(&[0.0, 0.2, 0.4, 0.6, 0.8])).await;
    let events = Arc::new(ChannelBroadcaster::new(64));
    let mut rx = events.subscribe();

    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(ScriptedGateway::failing_on(3)),
        Arc::clone(&events),
    )
    .build();

    let err = orchestrator.start("exp-1", None).await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));

    let runs = repository.list_runs("exp-1").await.unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.status(), RunStatus::Failed);
    assert!(run.error().unwrap().contains("provider unavailable on call 3"));
    assert!(run.completed_at().is_some());

    let responses = repository.list_responses(run.run_id()).await.unwrap();
    assert_eq!(responses.len(), 2);
    for response in &responses {
        assert!(repository
            .get_metric(response.response_id())
            .await
            .unwrap()
            .is_some());
    }
    assert_eq!(repository.metric_count(), 2);

    let events = drain(&mut rx);
    assert_eq!(count(&events, EventName::RunFailed), 1);
    assert_eq!(count(&events, EventName::RunCompleted), 0);
    assert_eq!(count(&events, EventName::RunProgress), 2);
    assert_eq!(events.last().unwrap().name, EventName::RunFailed);
}

#[tokio::test]
async fn test_failing_remote_scorer_falls_back() {
    let repository = repository_with(temperatures(&[0.1, 0.5, 0.9])).await;
    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(ScriptedGateway::default()),
        Arc::new(ChannelBroadcaster::default()),
    )
    .remote_scorer(Arc::new(FailingScorer))
    .build();

    let run = orchestrator.start("exp-1", None).await.unwrap();
    assert_eq!(run.status(), RunStatus::Completed);

    let responses = repository.list_responses(run.run_id()).await.unwrap();
    assert_eq!(responses.len(), 3);
    for response in &responses {
        let metric = repository
            .get_metric(response.response_id())
            .await
            .unwrap()
            .unwrap();
        assert!(metric.is_fallback());
        assert_eq!(metric.scorer_version(), SCORER_VERSION);

        let local = QualityScorer::new().compute(PROMPT, response.text());
        assert!((metric.overall_quality() - local.overall_quality).abs() < f64::EPSILON);
    }
}

#[tokio::test]
async fn test_slow_remote_scorer_times_out_to_fallback() {
    let repository = repository_with(temperatures(&[0.1])).await;
    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(ScriptedGateway::default()),
        Arc::new(ChannelBroadcaster::default()),
    )
    .remote_scorer(Arc::new(SlowScorer))
    .scoring_timeout(Duration::from_millis(20))
    .build();

    let run = orchestrator.start("exp-1", None).await.unwrap();
    assert_eq!(run.status(), RunStatus::Completed);

    let response = &repository.list_responses(run.run_id()).await.unwrap()[0];
    let metric = repository
        .get_metric(response.response_id())
        .await
        .unwrap()
        .unwrap();
    assert!(metric.is_fallback());
}

#[tokio::test]
async fn test_missing_experiment_creates_nothing() {
    let repository = Arc::new(MemoryRepository::new());
    let events = Arc::new(ChannelBroadcaster::new(8));
    let mut rx = events.subscribe();
    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(MockGateway::new()),
        Arc::clone(&events),
    )
    .build();

    let err = orchestrator.start("missing", None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: "experiment", .. }));
    assert!(repository.is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_invalid_override_creates_nothing() {
    let repository = repository_with(GridSpec::default()).await;
    let events = Arc::new(ChannelBroadcaster::new(8));
    let mut rx = events.subscribe();
    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(MockGateway::new()),
        Arc::clone(&events),
    )
    .build();

    let bad = GridSpec {
        top_p: Some(vec![1.5]),
        ..GridSpec::default()
    };
    let err = orchestrator.start("exp-1", Some(&bad)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(repository.run_count(), 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_unrecorded_completion_fails_run() {
    let repository = Arc::new(CompletionRejectingRepository {
        inner: MemoryRepository::new(),
    });
    repository
        .create_experiment(
            ExperimentRecord::builder("exp-1", "Ledgers", PROMPT, "test-model")
                .grid_spec(temperatures(&[0.1, 0.9]))
                .build(),
        )
        .await
        .unwrap();
    let events = Arc::new(ChannelBroadcaster::new(64));
    let mut rx = events.subscribe();

    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(ScriptedGateway::default()),
        Arc::clone(&events),
    )
    .build();

    let err = orchestrator.start("exp-1", None).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));

    let events = drain(&mut rx);
    assert_eq!(count(&events, EventName::RunFailed), 1);
    assert_eq!(count(&events, EventName::RunCompleted), 0);

    let runs = repository.list_runs("exp-1").await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status(), RunStatus::Failed);
    assert!(runs[0].error().is_some_and(|e| e.contains("disk full")));
    assert_eq!(repository.list_responses(runs[0].run_id()).await.unwrap().len(), 2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_runs_share_one_orchestrator() {
    let repository = repository_with(temperatures(&[0.1, 0.9])).await;
    let orchestrator = Arc::new(
        RunOrchestrator::builder(
            Arc::clone(&repository),
            Arc::new(MockGateway::with_latency(Duration::from_millis(5))),
            Arc::new(ChannelBroadcaster::default()),
        )
        .build(),
    );

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.start("exp-1", None).await })
        })
        .collect();

    for handle in handles {
        let run = handle.await.unwrap().unwrap();
        assert_eq!(run.status(), RunStatus::Completed);
        assert_eq!(repository.list_responses(run.run_id()).await.unwrap().len(), 2);
    }
    assert_eq!(repository.run_count(), 3);
    assert_eq!(repository.metric_count(), 6);
}
