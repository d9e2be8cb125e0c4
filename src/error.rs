//! Error types for gridlab
//!
//! Any error raised while a run executes marks it FAILED. Scoring failures never
//! reach that point: they are absorbed by the local fallback scorer and only
//! show up as a flag on the persisted metric.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// gridlab error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed grid or parameters, rejected before any run state exists
    #[error("Invalid grid: {0}")]
    Validation(String),

    /// Referenced row does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind ("experiment", "run", "response")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Provider call failed or timed out (fatal to the current run)
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Remote scorer unavailable; recovered locally, never surfaced as a run failure
    #[error("Scoring degraded: {0}\nFalling back to local heuristic scorer")]
    Scoring(String),

    /// Illegal run state transition (terminal states are final)
    #[error("Invalid run transition: {from} -> {to}")]
    InvalidTransition {
        /// Status the run was in
        from: String,
        /// Status that was requested
        to: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encoding/decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV encoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] on the given entity kind.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

}
