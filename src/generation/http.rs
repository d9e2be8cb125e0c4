//! OpenAI-compatible chat-completions backend

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{estimate_tokens, Generation, GenerationGateway};
use crate::grid::ParameterSet;
use crate::{Error, Result};

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
}

impl<'a> ChatRequest<'a> {
    fn new(prompt: &'a str, params: &'a ParameterSet) -> Self {
        Self {
            model: &params.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            stream: false,
            top_k: params.top_k,
            seed: params.seed,
            presence_penalty: params.presence_penalty,
            frequency_penalty: params.frequency_penalty,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

impl ChatResponse {
    /// Token counts the provider leaves out are estimated from the text.
    fn into_generation(self, prompt: &str, latency_ms: u64) -> Generation {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let usage = self.usage.unwrap_or_default();
        Generation {
            tokens_in: usage
                .prompt_tokens
                .unwrap_or_else(|| estimate_tokens(prompt)),
            tokens_out: usage
                .completion_tokens
                .unwrap_or_else(|| estimate_tokens(&text)),
            text,
            latency_ms,
        }
    }
}

/// Backend speaking the `/chat/completions` protocol (Groq, OpenAI, vLLM, ...).
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Gateway for `base_url` authenticated with `api_key`; every call is
    /// bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API key is empty or the client cannot
    /// be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config(
                "an API key is required for the HTTP generation gateway".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build generation client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

impl GenerationGateway for HttpGateway {
    async fn generate(&self, prompt: &str, params: &ParameterSet) -> Result<Generation> {
        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest::new(prompt, params))
            .send()
            .await
            .map_err(|e| Error::Generation(format!("provider request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("provider error {status}: {body}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("invalid provider payload: {e}")))?;

        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(body.into_generation(prompt, latency_ms))
    }
}
