//! Run orchestration
//!
//! [`RunOrchestrator::start`] drives one run of an experiment end to end:
//!
//! ```text
//! load experiment → merge + validate grid → create run (RUNNING) → run.started
//!   for each parameter set, for each sample:
//!     resolve seed/penalties/budget → generate → persist response → response.generated
//!     score against the raw prompt → persist metric → metrics.computed → run.progress
//! → COMPLETED + run.completed   (or FAILED + run.failed on the first generation error)
//! ```
//!
//! Work units inside a run execute strictly one after another. Independent
//! runs may share one orchestrator behind an `Arc`; [`RunOrchestrator::launch`]
//! returns as soon as the run exists and executes it on a spawned task.

mod builder;

pub use builder::{RunOrchestratorBuilder, DEFAULT_MIN_TOKEN_BUDGET, DEFAULT_SCORING_TIMEOUT};

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::events::{Broadcaster, RunEvent};
use crate::experiment::{
    new_id, MetricRecord, Repository, ResponseRecord, RunRecord, RunStatus,
};
use crate::generation::GenerationGateway;
use crate::grid::{expand, merge, GridSpec, ParameterSet};
use crate::prompt::{self, BuiltPrompt, QualityMode};
use crate::scoring::{QualityScorer, RemoteScorer, ScoreCard};
use crate::Result;

/// Placeholder remote scorer type for orchestrators without one.
///
/// Uninhabited: an orchestrator typed with it always scores locally.
#[derive(Debug, Clone, Copy)]
pub enum NoRemoteScorer {}

impl RemoteScorer for NoRemoteScorer {
    async fn compute(&self, _prompt: &str, _text: &str) -> Result<ScoreCard> {
        match *self {}
    }

    fn version(&self) -> &str {
        match *self {}
    }
}

/// Drives runs of experiments through a generation gateway, the scorer, a
/// repository and a broadcaster.
#[derive(Debug)]
pub struct RunOrchestrator<R, G, B, S = NoRemoteScorer> {
    repository: Arc<R>,
    gateway: Arc<G>,
    events: Arc<B>,
    remote: Option<Arc<S>>,
    scorer: QualityScorer,
    quality_mode: QualityMode,
    min_token_budget: u32,
    scoring_timeout: Duration,
    master_seed: Option<u64>,
}

/// Everything a run's loop needs, fixed before the first unit executes.
struct RunPlan {
    run_id: String,
    experiment_id: String,
    raw_prompt: String,
    built: BuiltPrompt,
    sets: Vec<ParameterSet>,
    samples: usize,
    total: usize,
    explicit_budget: bool,
}

impl<R, G, B> RunOrchestrator<R, G, B>
where
    R: Repository,
    G: GenerationGateway,
    B: Broadcaster,
{
    /// Start configuring an orchestrator over the given collaborators.
    #[must_use]
    pub fn builder(
        repository: Arc<R>,
        gateway: Arc<G>,
        events: Arc<B>,
    ) -> RunOrchestratorBuilder<R, G, B> {
        RunOrchestratorBuilder::new(repository, gateway, events)
    }
}

impl<R, G, B, S> RunOrchestrator<R, G, B, S>
where
    R: Repository,
    G: GenerationGateway,
    B: Broadcaster,
    S: RemoteScorer,
{
    /// Repository runs persist through.
    #[must_use]
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Broadcaster runs publish to.
    #[must_use]
    pub fn events(&self) -> &Arc<B> {
        &self.events
    }

    /// Quality mode used to elaborate prompts.
    #[must_use]
    pub const fn quality_mode(&self) -> QualityMode {
        self.quality_mode
    }

    /// Execute one run of `experiment_id`, with `grid_override` replacing the
    /// experiment's declared dimensions where present.
    ///
    /// Returns the run in its terminal `COMPLETED` state.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NotFound`] if the experiment does not exist (nothing is created)
    /// - [`crate::Error::Validation`] if the merged grid is invalid (nothing is created)
    /// - [`crate::Error::Generation`] if a generation call fails; the run is
    ///   then `FAILED` and keeps the responses produced so far
    #[tracing::instrument(skip_all, fields(experiment_id = %experiment_id))]
    pub async fn start(
        &self,
        experiment_id: &str,
        grid_override: Option<&GridSpec>,
    ) -> Result<RunRecord> {
        let (_, plan) = self.prepare(experiment_id, grid_override).await?;
        self.finish(plan).await
    }

    /// Create the run and execute it on a spawned task.
    ///
    /// Returns the freshly created `RUNNING` run, so callers can follow it
    /// by ID, and the handle resolving to what [`Self::start`] would return.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] or [`crate::Error::Validation`]
    /// before anything is created; generation errors surface through the
    /// handle.
    pub async fn launch(
        self: &Arc<Self>,
        experiment_id: &str,
        grid_override: Option<&GridSpec>,
    ) -> Result<(RunRecord, JoinHandle<Result<RunRecord>>)>
    where
        R: 'static,
        G: 'static,
        B: 'static,
        S: 'static,
    {
        let (run, plan) = self.prepare(experiment_id, grid_override).await?;
        let orchestrator = Arc::clone(self);
        let handle = tokio::spawn(async move { orchestrator.finish(plan).await });
        Ok((run, handle))
    }

    /// Load, merge and validate, then create the run and announce it.
    async fn prepare(
        &self,
        experiment_id: &str,
        grid_override: Option<&GridSpec>,
    ) -> Result<(RunRecord, RunPlan)> {
        let experiment = self.repository.get_experiment(experiment_id).await?;
        let grid = merge(experiment.grid_spec(), grid_override);
        let sets = expand(experiment.model(), &grid)?;
        let samples = grid.samples_or_default() as usize;
        let total = sets.len() * samples;

        let run = self
            .repository
            .create_run(RunRecord::new(new_id(), experiment_id, total))
            .await?;
        info!(run_id = %run.run_id(), combinations = sets.len(), samples, total, "run started");
        self.events
            .publish(RunEvent::started(run.run_id(), experiment_id));

        let plan = RunPlan {
            run_id: run.run_id().to_string(),
            experiment_id: experiment_id.to_string(),
            raw_prompt: experiment.prompt().to_string(),
            built: prompt::build(experiment.prompt(), self.quality_mode),
            sets,
            samples,
            total,
            explicit_budget: grid.max_tokens.is_some(),
        };
        Ok((run, plan))
    }

    /// Run the loop, then move the run to its terminal state.
    ///
    /// A failure to record completion fails the run like any loop error.
    async fn finish(&self, plan: RunPlan) -> Result<RunRecord> {
        let outcome = async {
            self.execute(&plan).await?;
            self.repository
                .update_run_status(&plan.run_id, RunStatus::Completed, None)
                .await
        }
        .await;

        match outcome {
            Ok(run) => {
                info!(run_id = %plan.run_id, total = plan.total, "run completed");
                self.events
                    .publish(RunEvent::completed(&plan.run_id, &plan.experiment_id));
                Ok(run)
            }
            Err(e) => {
                let message = e.to_string();
                error!(run_id = %plan.run_id, error = %message, "run failed");
                if let Err(update) = self
                    .repository
                    .update_run_status(&plan.run_id, RunStatus::Failed, Some(message.clone()))
                    .await
                {
                    error!(run_id = %plan.run_id, error = %update, "could not mark run as failed");
                }
                self.events.publish(RunEvent::failed(
                    &plan.run_id,
                    &plan.experiment_id,
                    message,
                ));
                Err(e)
            }
        }
    }

    async fn execute(&self, plan: &RunPlan) -> Result<()> {
        let mut rng = self.seed_source();
        let mut completed = 0;

        for (unit, base) in plan.sets.iter().enumerate() {
            for sample in 0..plan.samples {
                let params = self.resolve(base, plan, &mut rng);
                debug!(
                    run_id = %plan.run_id,
                    unit,
                    sample,
                    seed = ?params.seed,
                    temperature = params.temperature,
                    top_p = params.top_p,
                    "generating"
                );

                let generation = self.gateway.generate(&plan.built.prompt, &params).await?;
                let response = self
                    .repository
                    .create_response(ResponseRecord::new(
                        new_id(),
                        plan.run_id.as_str(),
                        completed,
                        params,
                        generation,
                    ))
                    .await?;
                self.events.publish(RunEvent::response_generated(
                    &plan.run_id,
                    &plan.experiment_id,
                    response.response_id(),
                ));

                let (card, version) = self.score(&plan.raw_prompt, response.text()).await;
                self.repository
                    .create_metric(MetricRecord::new(
                        new_id(),
                        response.response_id(),
                        card,
                        version,
                    ))
                    .await?;
                self.events.publish(RunEvent::metrics_computed(
                    &plan.run_id,
                    &plan.experiment_id,
                    response.response_id(),
                ));

                completed += 1;
                self.events.publish(RunEvent::progress(
                    &plan.run_id,
                    &plan.experiment_id,
                    completed,
                    plan.total,
                ));
            }
        }

        Ok(())
    }

    /// Per-replicate parameters: seed assigned, penalties defaulted, budget raised.
    fn resolve(&self, base: &ParameterSet, plan: &RunPlan, rng: &mut StdRng) -> ParameterSet {
        // A fixed seed is reused by every replicate.
        let seed = base.seed.unwrap_or_else(|| u64::from(rng.next_u32()));
        let mut params = base.with_seed(seed);
        params.presence_penalty = params
            .presence_penalty
            .or(Some(plan.built.penalties.presence));
        params.frequency_penalty = params
            .frequency_penalty
            .or(Some(plan.built.penalties.frequency));
        if !plan.explicit_budget {
            params.max_tokens = params.max_tokens.max(self.min_token_budget);
        }
        params
    }

    fn seed_source(&self) -> StdRng {
        self.master_seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
    }

    /// Score with the remote scorer when configured, falling back to the
    /// local heuristic on error or timeout. Never fails.
    async fn score(&self, prompt: &str, text: &str) -> (ScoreCard, String) {
        let local = || {
            (
                self.scorer.compute(prompt, text),
                self.scorer.version().to_string(),
            )
        };

        let Some(remote) = &self.remote else {
            return local();
        };

        match timeout(self.scoring_timeout, remote.compute(prompt, text)).await {
            Ok(Ok(card)) => (card, remote.version().to_string()),
            Ok(Err(e)) => {
                warn!(error = %e, "remote scoring failed, using local scorer");
                let (card, version) = local();
                (card.into_fallback(), version)
            }
            Err(_) => {
                warn!(
                    timeout_ms = u64::try_from(self.scoring_timeout.as_millis()).unwrap_or(u64::MAX),
                    "remote scoring timed out, using local scorer"
                );
                let (card, version) = local();
                (card.into_fallback(), version)
            }
        }
    }
}
