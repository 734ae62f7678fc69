//! OpenAI-compatible chat completion client.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, CompletionBackend, CompletionError};
use crate::config::CompletionConfig;
use crate::error::{EfficodeError, Result};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Blocking client for `POST {api_base}/chat/completions`
#[derive(Clone)]
pub struct HttpCompletion {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl HttpCompletion {
    /// Build a client from configuration.
    ///
    /// Must not be called from inside an async runtime thread; the
    /// blocking client owns its own runtime.
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| EfficodeError::Config("completion API key not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EfficodeError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: Some(config.temperature),
            max_tokens: Some(config.max_tokens),
        })
    }

    /// Target endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for HttpCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletion")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl CompletionBackend for HttpCompletion {
    fn complete(&self, history: &[ChatMessage]) -> std::result::Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: history,
            stream: false,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!("POST {} ({} messages)", self.endpoint, history.len());
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            tracing::error!("Completion service returned {}: {}", status, message);
            return Err(CompletionError::Service {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CompletionError::Service {
                code: status.as_u16(),
                message: "response contained no choices".to_string(),
            })
    }
}
