//! Experiment Schema
//!
//! Records persisted for every grid run, and the repository seam they are
//! stored through.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              └──< ResponseRecord (N) ── MetricRecord (0..1)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use gridlab::experiment::{ExperimentRecord, RunRecord, RunStatus};
//!
//! let experiment = ExperimentRecord::new("exp-001", "Ledgers", "Explain ledgers", "m");
//!
//! // Runs are created already running
//! let mut run = RunRecord::new("run-001", experiment.experiment_id(), 8);
//! run.transition(RunStatus::Completed, None).unwrap();
//! assert!(run.status().is_terminal());
//! ```

mod experiment_record;
mod memory;
mod metric_record;
mod repository;
mod response_record;
mod run_record;

pub use experiment_record::{ExperimentRecord, ExperimentRecordBuilder};
pub use memory::MemoryRepository;
pub use metric_record::MetricRecord;
pub use repository::Repository;
pub use response_record::ResponseRecord;
pub use run_record::{RunRecord, RunStatus};

/// Fresh random identifier for a new row.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
