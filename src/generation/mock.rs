//! Deterministic mock backend for local development and CI

use std::time::{Duration, Instant};

use super::{estimate_tokens, Generation, GenerationGateway};
use crate::grid::ParameterSet;
use crate::Result;

const EXCERPT_CHARS: usize = 160;

/// Backend that answers without any network access.
///
/// The text depends only on the prompt and the parameters, so identical
/// requests produce identical responses.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    latency: Duration,
}

impl MockGateway {
    /// Mock with no simulated latency.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latency: Duration::ZERO,
        }
    }

    /// Mock that sleeps for `latency` before answering.
    #[must_use]
    pub const fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

fn tone(temperature: f64) -> &'static str {
    if temperature > 0.7 {
        "more creative"
    } else if temperature < 0.3 {
        "more deterministic"
    } else {
        "balanced"
    }
}

/// The user's question when `prompt` is an elaborated instruction prompt.
fn user_question(prompt: &str) -> &str {
    let mut parts = prompt.splitn(3, "\"\"\"");
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(inner), Some(_)) => inner.trim(),
        _ => prompt.trim(),
    }
}

impl GenerationGateway for MockGateway {
    async fn generate(&self, prompt: &str, params: &ParameterSet) -> Result<Generation> {
        let started = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let excerpt: String = user_question(prompt).chars().take(EXCERPT_CHARS).collect();
        let seed = params
            .seed
            .map_or_else(|| "unset".to_string(), |s| s.to_string());
        let text = format!(
            "## Mocked answer ({tone})\n\
             - {excerpt}\n\
             Sampled with temperature {temperature:.2}, top_p {top_p:.2} and seed {seed}.\n",
            tone = tone(params.temperature),
            temperature = params.temperature,
            top_p = params.top_p,
        );

        Ok(Generation {
            tokens_in: estimate_tokens(prompt),
            tokens_out: estimate_tokens(&text),
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{build, QualityMode};

    fn params(temperature: f64) -> ParameterSet {
        ParameterSet {
            model: "mock".to_string(),
            temperature,
            top_p: 0.9,
            top_k: None,
            max_tokens: 256,
            presence_penalty: None,
            frequency_penalty: None,
            seed: Some(11),
        }
    }

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let gateway = MockGateway::new();
        let a = gateway.generate("Explain ledgers", &params(0.5)).await.unwrap();
        let b = gateway.generate("Explain ledgers", &params(0.5)).await.unwrap();
        assert_eq!(a.text, b.text);
        assert!(a.text.contains("balanced"));
        assert!(a.text.contains("seed 11"));
    }

    #[tokio::test]
    async fn test_mock_tone_follows_temperature() {
        let gateway = MockGateway::new();
        let cold = gateway.generate("q", &params(0.0)).await.unwrap();
        let hot = gateway.generate("q", &params(0.9)).await.unwrap();
        assert!(cold.text.contains("more deterministic"));
        assert!(hot.text.contains("more creative"));
    }

    #[tokio::test]
    async fn test_mock_echoes_user_question_from_elaborated_prompt() {
        let built = build("Describe settlement windows", QualityMode::Strong);
        let out = MockGateway::new()
            .generate(&built.prompt, &params(0.3))
            .await
            .unwrap();
        assert!(out.text.contains("- Describe settlement windows"));
        assert!(out.tokens_in > out.tokens_out);
    }
}
