//! Builder for `RunOrchestrator`

use std::sync::Arc;
use std::time::Duration;

use super::{NoRemoteScorer, RunOrchestrator};
use crate::prompt::QualityMode;
use crate::scoring::QualityScorer;

/// Token budget enforced when the grid does not declare `max_tokens`.
pub const DEFAULT_MIN_TOKEN_BUDGET: u32 = 3072;

/// Upper bound on one remote scoring call.
pub const DEFAULT_SCORING_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for [`RunOrchestrator`].
#[derive(Debug)]
pub struct RunOrchestratorBuilder<R, G, B, S = NoRemoteScorer> {
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

impl<R, G, B> RunOrchestratorBuilder<R, G, B> {
    /// Create a new builder with required collaborators.
    #[must_use]
    pub fn new(repository: Arc<R>, gateway: Arc<G>, events: Arc<B>) -> Self {
        Self {
            repository,
            gateway,
            events,
            remote: None,
            scorer: QualityScorer::new(),
            quality_mode: QualityMode::default(),
            min_token_budget: DEFAULT_MIN_TOKEN_BUDGET,
            scoring_timeout: DEFAULT_SCORING_TIMEOUT,
            master_seed: None,
        }
    }
}

impl<R, G, B, S> RunOrchestratorBuilder<R, G, B, S> {
    /// Score through `remote` first, keeping the local scorer as fallback.
    #[must_use]
    pub fn remote_scorer<S2>(self, remote: Arc<S2>) -> RunOrchestratorBuilder<R, G, B, S2> {
        RunOrchestratorBuilder {
            repository: self.repository,
            gateway: self.gateway,
            events: self.events,
            remote: Some(remote),
            scorer: self.scorer,
            quality_mode: self.quality_mode,
            min_token_budget: self.min_token_budget,
            scoring_timeout: self.scoring_timeout,
            master_seed: self.master_seed,
        }
    }

    /// Set the local scorer.
    #[must_use]
    pub const fn scorer(mut self, scorer: QualityScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Set the prompt elaboration mode.
    #[must_use]
    pub const fn quality_mode(mut self, mode: QualityMode) -> Self {
        self.quality_mode = mode;
        self
    }

    /// Set the minimum token budget applied when the grid leaves
    /// `max_tokens` undeclared.
    #[must_use]
    pub const fn min_token_budget(mut self, tokens: u32) -> Self {
        self.min_token_budget = tokens;
        self
    }

    /// Set the remote scoring timeout.
    #[must_use]
    pub const fn scoring_timeout(mut self, timeout: Duration) -> Self {
        self.scoring_timeout = timeout;
        self
    }

    /// Draw per-replicate seeds from a generator seeded with `seed`, making
    /// runs reproducible.
    #[must_use]
    pub const fn master_seed(mut self, seed: u64) -> Self {
        self.master_seed = Some(seed);
        self
    }

    /// Build the `RunOrchestrator`.
    #[must_use]
    pub fn build(self) -> RunOrchestrator<R, G, B, S> {
        RunOrchestrator {
            repository: self.repository,
            gateway: self.gateway,
            events: self.events,
            remote: self.remote,
            scorer: self.scorer,
            quality_mode: self.quality_mode,
            min_token_budget: self.min_token_budget,
            scoring_timeout: self.scoring_timeout,
            master_seed: self.master_seed,
        }
    }
}
