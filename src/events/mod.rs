//! Run lifecycle events
//!
//! The orchestrator publishes a [`RunEvent`] at every observable step of a
//! run through an explicit [`Broadcaster`] handle. Delivery is best effort:
//! publishing never blocks and never fails a run.
//!
//! ```rust
//! use gridlab::events::{Broadcaster, ChannelBroadcaster, EventName, RunEvent};
//!
//! let events = ChannelBroadcaster::new(16);
//! let mut rx = events.subscribe();
//! events.publish(RunEvent::started("run-1", "exp-1"));
//! assert_eq!(rx.try_recv().unwrap().name, EventName::RunStarted);
//! ```

mod channel;
pub mod sse;

pub use channel::{ChannelBroadcaster, RunSubscription, DEFAULT_CAPACITY};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names of the events a run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    /// Run row created in `RUNNING`.
    #[serde(rename = "run.started")]
    RunStarted,
    /// One more work unit finished.
    #[serde(rename = "run.progress")]
    RunProgress,
    /// A response was persisted.
    #[serde(rename = "response.generated")]
    ResponseGenerated,
    /// A response's metric was persisted.
    #[serde(rename = "metrics.computed")]
    MetricsComputed,
    /// Run reached `COMPLETED`.
    #[serde(rename = "run.completed")]
    RunCompleted,
    /// Run reached `FAILED`.
    #[serde(rename = "run.failed")]
    RunFailed,
}

impl EventName {
    /// Dotted wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "run.started",
            Self::RunProgress => "run.progress",
            Self::ResponseGenerated => "response.generated",
            Self::MetricsComputed => "metrics.computed",
            Self::RunCompleted => "run.completed",
            Self::RunFailed => "run.failed",
        }
    }

    /// Whether the run emits nothing after this event.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::RunCompleted | Self::RunFailed)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work units done so far out of the run's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Units completed (response and metric persisted).
    pub completed: usize,
    /// Units planned for the run.
    pub total: usize,
}

/// Event payload; always carries the run ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// Event kind.
    #[serde(rename = "event")]
    pub name: EventName,
    /// Run the event belongs to.
    pub run_id: String,
    /// Experiment the run executes.
    pub experiment_id: String,
    /// Response the event concerns, for response and metric events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    /// Progress counter, for `run.progress`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    /// Failure message, for `run.failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Emission time.
    pub ts: DateTime<Utc>,
}

impl RunEvent {
    fn new(name: EventName, run_id: &str, experiment_id: &str) -> Self {
        Self {
            name,
            run_id: run_id.to_string(),
            experiment_id: experiment_id.to_string(),
            response_id: None,
            progress: None,
            error: None,
            ts: Utc::now(),
        }
    }

    /// `run.started`
    #[must_use]
    pub fn started(run_id: &str, experiment_id: &str) -> Self {
        Self::new(EventName::RunStarted, run_id, experiment_id)
    }

    /// `response.generated`
    #[must_use]
    pub fn response_generated(run_id: &str, experiment_id: &str, response_id: &str) -> Self {
        Self {
            response_id: Some(response_id.to_string()),
            ..Self::new(EventName::ResponseGenerated, run_id, experiment_id)
        }
    }

    /// `metrics.computed`
    #[must_use]
    pub fn metrics_computed(run_id: &str, experiment_id: &str, response_id: &str) -> Self {
        Self {
            response_id: Some(response_id.to_string()),
            ..Self::new(EventName::MetricsComputed, run_id, experiment_id)
        }
    }

    /// `run.progress`
    #[must_use]
    pub fn progress(run_id: &str, experiment_id: &str, completed: usize, total: usize) -> Self {
        Self {
            progress: Some(Progress { completed, total }),
            ..Self::new(EventName::RunProgress, run_id, experiment_id)
        }
    }

    /// `run.completed`
    #[must_use]
    pub fn completed(run_id: &str, experiment_id: &str) -> Self {
        Self::new(EventName::RunCompleted, run_id, experiment_id)
    }

    /// `run.failed`
    #[must_use]
    pub fn failed(run_id: &str, experiment_id: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(EventName::RunFailed, run_id, experiment_id)
        }
    }
}

/// Sink for run events.
///
/// `publish` is synchronous and infallible: a run never waits on, or fails
/// because of, its observers.
pub trait Broadcaster: Send + Sync {
    /// Hand an event to every current subscriber.
    fn publish(&self, event: RunEvent);
}
