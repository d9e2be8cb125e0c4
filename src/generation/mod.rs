//! Generation gateways - the text-generation backends a run drives
//!
//! ```rust
//! use gridlab::generation::{GenerationGateway, MockGateway};
//! use gridlab::grid::{expand, GridSpec};
//!
//! # async fn example() -> gridlab::Result<()> {
//! let gateway = MockGateway::new();
//! let params = expand("mock-model", &GridSpec::default())?.remove(0).with_seed(7);
//! let generated = gateway.generate("Explain ledgers", &params).await?;
//! assert!(generated.tokens_out > 0);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "http")]
mod http;
mod mock;

#[cfg(feature = "http")]
pub use http::HttpGateway;
pub use mock::MockGateway;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::grid::ParameterSet;
use crate::Result;

/// Text plus telemetry returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text.
    pub text: String,
    /// Prompt tokens consumed.
    pub tokens_in: u32,
    /// Completion tokens produced (reported even when output is truncated).
    pub tokens_out: u32,
    /// Wall-clock latency of the call.
    pub latency_ms: u64,
}

/// Backend that turns a prompt and a parameter set into text.
///
/// Implementations own their timeouts; a timeout is reported as
/// [`crate::Error::Generation`].
pub trait GenerationGateway: Send + Sync {
    /// Generate one completion.
    fn generate(
        &self,
        prompt: &str,
        params: &ParameterSet,
    ) -> impl Future<Output = Result<Generation>> + Send;
}

/// Rough token estimate for backends that do not report usage.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn estimate_tokens(text: &str) -> u32 {
    let words = text.split_whitespace().count() as f64;
    ((words * 1.3).ceil() as u32).max(1)
}
