//! Metric Record - quality assessment of one response

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::{ScoreCard, ScoreDetails, Scores};

/// Metric Record stores the scores computed for a response (1:1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    metric_id: String,
    response_id: String,
    scores: Scores,
    overall_quality: f64,
    details: ScoreDetails,
    scorer_version: String,
    created_at: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a metric record from a score card.
    ///
    /// # Arguments
    ///
    /// * `metric_id` - Unique identifier for the metric
    /// * `response_id` - ID of the scored response
    /// * `card` - Scores, composite and diagnostics
    /// * `scorer_version` - Version tag of the scorer that produced `card`
    #[must_use]
    pub fn new(
        metric_id: impl Into<String>,
        response_id: impl Into<String>,
        card: ScoreCard,
        scorer_version: impl Into<String>,
    ) -> Self {
        Self {
            metric_id: metric_id.into(),
            response_id: response_id.into(),
            scores: card.scores,
            overall_quality: card.overall_quality,
            details: card.details,
            scorer_version: scorer_version.into(),
            created_at: Utc::now(),
        }
    }

    /// Get the metric ID.
    #[must_use]
    pub fn metric_id(&self) -> &str {
        &self.metric_id
    }

    /// Get the scored response ID.
    #[must_use]
    pub fn response_id(&self) -> &str {
        &self.response_id
    }

    /// Get the sub-scores.
    #[must_use]
    pub const fn scores(&self) -> &Scores {
        &self.scores
    }

    /// Get the weighted composite.
    #[must_use]
    pub const fn overall_quality(&self) -> f64 {
        self.overall_quality
    }

    /// Get the diagnostics.
    #[must_use]
    pub const fn details(&self) -> &ScoreDetails {
        &self.details
    }

    /// Whether the local scorer stood in for the remote one.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.details.fallback
    }

    /// Get the scorer version tag.
    #[must_use]
    pub fn scorer_version(&self) -> &str {
        &self.scorer_version
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::QualityScorer;

    #[test]
    fn test_metric_record_from_card() {
        let card = QualityScorer::new().compute("Explain ledgers", "A ledger records entries.");
        let overall = card.overall_quality;
        let metric = MetricRecord::new("m-1", "resp-1", card, "heuristic-v1");

        assert_eq!(metric.response_id(), "resp-1");
        assert!((metric.overall_quality() - overall).abs() < f64::EPSILON);
        assert_eq!(metric.scorer_version(), "heuristic-v1");
        assert!(!metric.is_fallback());
    }
}
