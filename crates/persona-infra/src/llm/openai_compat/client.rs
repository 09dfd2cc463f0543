//! OpenAiCompatClient -- concrete [`CompletionClient`] for OpenAI-style
//! `/chat/completions` endpoints (Moonshot by default).
//!
//! One call is one HTTP round-trip: no retries, no streaming. The API key
//! is wrapped in [`secrecy::SecretString`] and only exposed when the
//! `Authorization` header is built.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{Instrument, debug, info_span};

use persona_core::llm::client::CompletionClient;
use persona_types::chat::Turn;
use persona_types::config::ChatConfig;
use persona_types::llm::{ChatCompletionRequest, ChatCompletionResponse, CompletionError};

/// Chat-completion client for any OpenAI-compatible provider.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiCompatClient {
    /// Create a client for `{base_url}/chat/completions`.
    ///
    /// `timeout` bounds the whole request, connect through body.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Transport(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &ChatConfig, api_key: SecretString) -> Result<Self, CompletionError> {
        Self::new(
            config.base_url.clone(),
            config.model.clone(),
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(&self, turns: &[Turn]) -> Result<String, CompletionError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: turns.to_vec(),
            stream: false,
        };

        let response = self
            .client
            .post(self.url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %error_body, "provider returned error status");
            return Err(CompletionError::Api {
                code: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| CompletionError::Api {
            code: status.as_u16(),
            message: format!("failed to read response body: {e}"),
        })?;
        let parsed: ChatCompletionResponse =
            serde_json::from_slice(&bytes).map_err(|e| CompletionError::Api {
                code: status.as_u16(),
                message: format!("malformed response body: {e}"),
            })?;

        match parsed.first_content() {
            Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
            _ => Err(CompletionError::EmptyResponse),
        }
    }
}

// No Debug impl: the struct holds the API key.

/// Map a reqwest failure that happened before a usable response arrived.
fn transport_error(e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Transport("timeout".to_string())
    } else {
        CompletionError::Transport(e.to_string())
    }
}

impl CompletionClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai_compat"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, turns: &[Turn]) -> Result<String, CompletionError> {
        let span = info_span!(
            "gen_ai.chat",
            gen_ai.operation.name = "chat",
            gen_ai.system = self.name(),
            gen_ai.request.model = %self.model,
            gen_ai.request.turns = turns.len(),
            gen_ai.request.stream = false,
        );

        self.post(turns).instrument(span).await
    }
}
