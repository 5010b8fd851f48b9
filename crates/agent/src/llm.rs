use std::time::Duration;

use async_trait::async_trait;
use fairquote_core::config::LlmConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ANTHROPIC_API_VERSION: &str = "2023-06-01";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("no API key configured for the completion provider")]
    MissingApiKey,
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion request timed out")]
    Timeout,
    #[error("completion API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Completion boundary. Returns the raw text; callers never assume it is JSON.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Anthropic Messages API client. A single attempt per call.
pub struct AnthropicClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key, base_url: base_url.into() })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;
        Self::new(api_key, config.base_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::Api { status: status.as_u16(), message });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;

        collect_text(body)
    }
}

fn collect_text(body: MessagesResponse) -> Result<String, LlmError> {
    let text: Vec<String> = body
        .content
        .into_iter()
        .filter(|block| block.kind.is_empty() || block.kind == "text")
        .map(|block| block.text)
        .collect();

    if text.is_empty() {
        return Err(LlmError::InvalidResponse("empty content array in response".to_string()));
    }
    Ok(text.join(""))
}
