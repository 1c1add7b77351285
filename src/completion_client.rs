// src/completion_client.rs
use crate::models::chat::MessageRole;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl From<MessageRole> for PromptRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => PromptRole::User,
            MessageRole::Assistant => PromptRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }
}

/// Body of an OpenAI-compatible `chat/completions` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("completion provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("completion response could not be parsed: {0}")]
    MalformedResponse(String),
    #[error("completion response contained no reply")]
    EmptyReply,
    #[error("completion provider is not configured")]
    NotConfigured,
}

/// An external language model that answers one context window with one reply.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Client for any provider speaking the OpenAI chat completions protocol
/// (Groq by default).
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.timeout)
                } else {
                    CompletionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(self.timeout)
            } else {
                CompletionError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            tracing::warn!("Completion provider error ({}): {}", status, response_text);
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyReply)
    }
}

/// Stand-in used when no provider key is configured; every call fails.
#[derive(Debug, Clone, Default)]
pub struct DisabledCompletionClient;

#[async_trait]
impl CompletionClient for DisabledCompletionClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        Err(CompletionError::NotConfigured)
    }

    fn is_configured(&self) -> bool {
        false
    }
}
