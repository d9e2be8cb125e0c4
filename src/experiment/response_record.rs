//! Response Record - one generation result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generation::Generation;
use crate::grid::ParameterSet;

/// Response Record holds the text and telemetry of one unit of work.
///
/// `params` is the parameter set actually sent, with its seed resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseRecord {
    response_id: String,
    run_id: String,
    sequence: usize,
    params: ParameterSet,
    text: String,
    tokens_in: u32,
    tokens_out: u32,
    latency_ms: u64,
    created_at: DateTime<Utc>,
}

impl ResponseRecord {
    /// Create a response record from a gateway result.
    ///
    /// # Arguments
    ///
    /// * `response_id` - Unique identifier for the response
    /// * `run_id` - ID of the owning run
    /// * `sequence` - Zero-based index of the work unit within the run
    /// * `params` - Parameters sent to the gateway
    /// * `generation` - Text and telemetry returned
    #[must_use]
    pub fn new(
        response_id: impl Into<String>,
        run_id: impl Into<String>,
        sequence: usize,
        params: ParameterSet,
        generation: Generation,
    ) -> Self {
        Self {
            response_id: response_id.into(),
            run_id: run_id.into(),
            sequence,
            params,
            text: generation.text,
            tokens_in: generation.tokens_in,
            tokens_out: generation.tokens_out,
            latency_ms: generation.latency_ms,
            created_at: Utc::now(),
        }
    }

    /// Get the response ID.
    #[must_use]
    pub fn response_id(&self) -> &str {
        &self.response_id
    }

    /// Get the owning run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the work-unit index.
    #[must_use]
    pub const fn sequence(&self) -> usize {
        self.sequence
    }

    /// Get the parameters used.
    #[must_use]
    pub const fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Get the generated text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Get the prompt token count.
    #[must_use]
    pub const fn tokens_in(&self) -> u32 {
        self.tokens_in
    }

    /// Get the completion token count.
    #[must_use]
    pub const fn tokens_out(&self) -> u32 {
        self.tokens_out
    }

    /// Get the call latency in milliseconds.
    #[must_use]
    pub const fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
