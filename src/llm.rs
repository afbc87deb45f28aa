//! LLM client abstraction and HTTP implementations.
//!
//! This module provides a generic [`LlmClient`] trait for text completion,
//! along with concrete implementations:
//!
//! - [`OpenAiClient`]: OpenAI-compatible Chat Completions API (default)
//! - [`AnthropicClient`]: Anthropic Messages API
//! - [`MockLlmClient`]: test double for unit tests
//!
//! Used by the NL query processor to translate questions into filter text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// A required API key environment variable is not set.
    #[error("{0} environment variable not set")]
    MissingApiKey(&'static str),

    /// HTTP or network error occurred.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Failed to parse the API response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Model returned no text content.
    #[error("Model returned empty response")]
    EmptyResponse,

    /// The configured provider name is not recognised.
    #[error("Unknown LLM provider '{0}'. Use 'openai' or 'anthropic'")]
    UnknownProvider(String),
}

// ============================================================================
// Completion Type
// ============================================================================

/// The result of a successful LLM completion request.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The generated text from the model.
    pub text: String,
}

// ============================================================================
// LlmClient Trait
// ============================================================================

/// Generic interface for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion given a system prompt, a user message and a
    /// sampling temperature.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<Completion, LlmError>;
}

/// Env var selecting the provider (`openai` or `anthropic`).
pub const PROVIDER_ENV: &str = "CHALLENGE_LLM_PROVIDER";

/// Build the configured client from the environment.
///
/// Defaults to the OpenAI client when [`PROVIDER_ENV`] is unset.
pub fn client_from_env() -> Result<Arc<dyn LlmClient>, LlmError> {
    let provider = std::env::var(PROVIDER_ENV).unwrap_or_else(|_| "openai".to_string());
    client_for_provider(&provider)
}

/// Build a client for a named provider, reading its key from the environment.
pub fn client_for_provider(provider: &str) -> Result<Arc<dyn LlmClient>, LlmError> {
    match provider.trim().to_ascii_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiClient::from_env()?)),
        "anthropic" => Ok(Arc::new(AnthropicClient::from_env()?)),
        other => Err(LlmError::UnknownProvider(other.to_string())),
    }
}

/// A message in the conversation.
#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

// ============================================================================
// OpenAI Implementation
// ============================================================================

/// Client for OpenAI-compatible Chat Completions endpoints.
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4.1-nano";

    /// Create a client from `OPENAI_API_KEY`, honouring `OPENAI_BASE_URL`
    /// and `OPENAI_MODEL` when set.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingApiKey`] if the key is not set.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::MissingApiKey("OPENAI_API_KEY"))?;
        let mut client = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            client.base_url = url;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            client.model = model;
        }
        Ok(client)
    }

    /// Create a client with an explicit API key and default endpoint/model.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<Completion, LlmError> {
        let request_body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(Completion { text })
    }
}

// ============================================================================
// Anthropic API Implementation
// ============================================================================

/// Client for the Anthropic Claude API.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

/// Request body for the Anthropic Messages API.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    temperature: f32,
    messages: Vec<Message>,
}

/// Response from the Anthropic Messages API.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

/// A content block in the API response.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

impl AnthropicClient {
    pub const DEFAULT_MODEL: &'static str = "claude-haiku-4-5";

    /// Create a new client from `ANTHROPIC_API_KEY`, honouring
    /// `ANTHROPIC_MODEL` when set.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingApiKey`] if the key is not set.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| LlmError::MissingApiKey("ANTHROPIC_API_KEY"))?;
        let mut client = Self::new(api_key);
        if let Ok(model) = std::env::var("ANTHROPIC_MODEL") {
            client.model = model;
        }
        Ok(client)
    }

    /// Create a new client with an explicit API key.
    ///
    /// Uses default model `claude-haiku-4-5` and max tokens `1024`.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: Self::DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<Completion, LlmError> {
        let request_body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.to_string(),
            temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = api_response
            .content
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?
            .text;

        Ok(Completion { text })
    }
}

// ============================================================================
// Mock Implementation (Test Only)
// ============================================================================

/// A recorded call to [`MockLlmClient`].
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Mock LLM client for testing. Returns pre-programmed results in FIFO order
/// and records every call.
#[cfg(test)]
pub struct MockLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, String>>>,
    pub calls: std::sync::Mutex<Vec<MockCall>>,
}

#[cfg(test)]
impl MockLlmClient {
    /// Create a mock that answers with each response in order.
    pub fn new(responses: Vec<String>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Create a mock that fails every call with an HTTP error.
    pub fn failing(message: &str) -> Self {
        Self::with_results(vec![Err(message.to_string())])
    }

    /// Create a mock from a mix of successes and failures (`Err` becomes
    /// [`LlmError::Http`]).
    ///
    /// # Panics
    ///
    /// [`complete`](LlmClient::complete) panics once the results run out.
    pub fn with_results(results: Vec<Result<String, String>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(results.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<Completion, LlmError> {
        self.calls.lock().unwrap().push(MockCall {
            system: system.to_string(),
            user: user.to_string(),
            temperature,
        });

        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockLlmClient: no more responses available");

        next.map(|text| Completion { text })
            .map_err(LlmError::Http)
    }
}

// ============================================================================
// Tests
// ============================================================================
