//! Completion service client
//!
//! The [`Completion`] trait is the orchestrator's only view of the external
//! text-generation API, so tests can script replies. [`OpenAiClient`] is the
//! real implementation: an OpenAI-compatible chat completions call with a
//! bounded output size and fixed temperature.
//!
//! Provider failures are classified by HTTP status into the error variants
//! the HTTP layer maps to client-visible categories. Raw provider detail
//! only ever reaches the log.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::types::ChatTurn;

/// Prompt in, completion text out.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// HTTP client for an OpenAI-compatible chat completions API.
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    /// Create a client from configuration.
    ///
    /// Returns an error when no API key is available.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("llm.api_key is required".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = format!("Bearer {}", api_key);
        let mut auth_header = HeaderValue::from_str(&auth_value)
            .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?;
        auth_header.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_header);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Create a client only when the configuration carries an API key.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        if !config.is_ready() {
            return Ok(None);
        }
        Self::new(config).map(Some)
    }

    fn classify(status: StatusCode, body: String) -> Error {
        let detail = format!("completion API error ({}): {}", status, body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::ProviderAuth(detail),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                Error::ProviderOverloaded(detail)
            }
            _ => Error::Provider(detail),
        }
    }
}

#[async_trait]
impl Completion for OpenAiClient {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Self::classify(status, body));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("completion response malformed: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Provider("completion returned no choices".to_string()))
    }
}
