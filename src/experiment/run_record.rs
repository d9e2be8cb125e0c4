//! Run Record - one execution of an experiment's grid

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run is not yet created (never persisted; runs are created running).
    Pending,
    /// Run is currently executing.
    Running,
    /// Every unit of work produced a persisted response.
    Completed,
    /// A generation call failed; remaining work was abandoned.
    Failed,
}

impl RunStatus {
    /// Whether no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run Record represents a single execution of an experiment.
///
/// A run is created already `Running` and may move exactly once, to
/// `Completed` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    status: RunStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    total_units: usize,
    error: Option<String>,
}

impl RunRecord {
    /// Create a new run record in `Running` status.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Unique identifier for the run
    /// * `experiment_id` - ID of the parent experiment
    /// * `total_units` - Parameter sets × samples the run will execute
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
        total_units: usize,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            total_units,
            error: None,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get the end timestamp, if the run reached a terminal state.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Get the number of work units the run was planned with.
    #[must_use]
    pub const fn total_units(&self) -> usize {
        self.total_units
    }

    /// Get the failure message of a failed run.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Move the run to a terminal status.
    ///
    /// Sets `completed_at` to now and records `error` for failed runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the run is `Running` and
    /// `status` is terminal.
    pub fn transition(&mut self, status: RunStatus, error: Option<String>) -> Result<()> {
        if self.status != RunStatus::Running || !status.is_terminal() {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        self.error = if status == RunStatus::Failed { error } else { None };
        Ok(())
    }
}
