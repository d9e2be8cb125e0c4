//! # gridlab: parameter-grid experiments for LLM generation
//!
//! **Version**: 0.1.0
//!
//! gridlab expands a declarative grid of sampling parameters into concrete
//! generation calls, drives them sequentially through a generation backend,
//! scores every response with a deterministic heuristic scorer and records
//! experiments, runs, responses and metrics through a repository while
//! publishing lifecycle events.
//!
//! ## Components
//!
//! - [`grid`]: grid merge and cartesian expansion
//! - [`prompt`]: raw prompt → structure-enforcing instruction prompt
//! - [`scoring`]: seven-signal heuristic quality scorer (optional remote scorer)
//! - [`generation`]: generation backends (mock, OpenAI-compatible HTTP)
//! - [`orchestrator`]: run lifecycle state machine
//! - [`experiment`]: persisted records and the repository seam
//! - [`events`]: lifecycle events, broadcast fan-out and SSE framing
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use gridlab::events::ChannelBroadcaster;
//! use gridlab::experiment::{ExperimentRecord, MemoryRepository, Repository, RunStatus};
//! use gridlab::generation::MockGateway;
//! use gridlab::grid::GridSpec;
//! use gridlab::orchestrator::RunOrchestrator;
//!
//! # async fn example() -> gridlab::Result<()> {
//! let repository = Arc::new(MemoryRepository::new());
//! let grid = GridSpec {
//!     temperature: Some(vec![0.2, 0.8]),
//!     top_p: Some(vec![0.9]),
//!     samples: Some(1),
//!     ..GridSpec::default()
//! };
//! repository
//!     .create_experiment(
//!         ExperimentRecord::builder("exp-1", "Ledgers", "Explain double-entry ledgers", "mock")
//!             .grid_spec(grid)
//!             .build(),
//!     )
//!     .await?;
//!
//! let orchestrator = RunOrchestrator::builder(
//!     Arc::clone(&repository),
//!     Arc::new(MockGateway::new()),
//!     Arc::new(ChannelBroadcaster::default()),
//! )
//! .build();
//!
//! let run = orchestrator.start("exp-1", None).await?;
//! assert_eq!(run.status(), RunStatus::Completed);
//! assert_eq!(repository.list_responses(run.run_id()).await?.len(), 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod events;
pub mod experiment;
pub mod export;
pub mod generation;
pub mod grid;
pub mod orchestrator;
pub mod prompt;
pub mod rank;
pub mod scoring;
pub mod telemetry;
mod text;

pub use error::{Error, Result};
