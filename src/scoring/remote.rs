//! Remote scoring collaborator
//!
//! A remote metrics service may replace the local heuristic scorer. It is
//! allowed to be slow or down: the orchestrator bounds every call with a
//! timeout and substitutes the local score on any failure.

use std::future::Future;

use super::ScoreCard;
use crate::Result;

/// Scoring service reached over the network.
pub trait RemoteScorer: Send + Sync {
    /// Score `text` as an answer to `prompt`.
    ///
    /// Failures are reported as [`crate::Error::Scoring`].
    fn compute(&self, prompt: &str, text: &str) -> impl Future<Output = Result<ScoreCard>> + Send;

    /// Version tag recorded on metrics this scorer produces.
    fn version(&self) -> &str;
}

#[cfg(feature = "http")]
mod http {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use super::RemoteScorer;
    use crate::scoring::{ScoreCard, ScoreDetails, Scores};
    use crate::{Error, Result};

    /// Timeout applied to health probes.
    const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

    #[derive(Serialize)]
    struct MetricsRequest<'a> {
        prompt: &'a str,
        response: &'a str,
    }

    #[derive(Deserialize)]
    struct MetricsResponse {
        #[serde(default)]
        scores: BTreeMap<String, f64>,
        #[serde(default, alias = "overallQuality")]
        overall_quality: Option<f64>,
        #[serde(default)]
        details: Option<ScoreDetails>,
    }

    impl MetricsResponse {
        fn into_card(self) -> ScoreCard {
            let pick = |name: &str| {
                self.scores
                    .get(name)
                    .copied()
                    .unwrap_or(0.0)
                    .clamp(0.0, 1.0)
            };
            let scores = Scores {
                completeness: pick("completeness"),
                structure: pick("structure"),
                coherence: pick("coherence"),
                redundancy: pick("redundancy"),
                lexical_diversity: pick("lexical_diversity"),
                length_adequacy: pick("length_adequacy"),
                readability: pick("readability"),
            };
            let overall_quality = self
                .overall_quality
                .map_or_else(|| scores.overall(), |q| q.clamp(0.0, 1.0));
            ScoreCard {
                overall_quality,
                scores,
                details: self.details.unwrap_or_default(),
            }
        }
    }

    /// Client for a metrics service exposing `POST /metrics` and `GET /health`.
    #[derive(Debug, Clone)]
    pub struct HttpRemoteScorer {
        base_url: String,
        client: reqwest::Client,
        version: String,
    }

    impl HttpRemoteScorer {
        /// Create a client for `base_url` with a per-request timeout.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Config`] if the HTTP client cannot be built.
        pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| Error::Config(format!("Failed to build metrics client: {e}")))?;
            Ok(Self {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                client,
                version: "metrics-service".to_string(),
            })
        }

        /// Override the version tag recorded on metrics.
        #[must_use]
        pub fn with_version(mut self, version: impl Into<String>) -> Self {
            self.version = version.into();
            self
        }

        /// Whether the service answers its health probe.
        pub async fn health(&self) -> bool {
            self.client
                .get(format!("{}/health", self.base_url))
                .timeout(HEALTH_TIMEOUT)
                .send()
                .await
                .is_ok_and(|r| r.status().is_success())
        }
    }

    impl RemoteScorer for HttpRemoteScorer {
        async fn compute(&self, prompt: &str, text: &str) -> Result<ScoreCard> {
            let response = self
                .client
                .post(format!("{}/metrics", self.base_url))
                .json(&MetricsRequest {
                    prompt,
                    response: text,
                })
                .send()
                .await
                .map_err(|e| Error::Scoring(format!("metrics request failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Scoring(format!(
                    "metrics service returned {status}: {body}"
                )));
            }

            let body: MetricsResponse = response
                .json()
                .await
                .map_err(|e| Error::Scoring(format!("invalid metrics payload: {e}")))?;
            Ok(body.into_card())
        }

        fn version(&self) -> &str {
            &self.version
        }
    }

}

#[cfg(feature = "http")]
pub use http::HttpRemoteScorer;
