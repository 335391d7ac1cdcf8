use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for LLM operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Temperature for generation (0.0-2.0, default: 0.7)
    pub temperature: f32,

    /// Maximum tokens to generate (default: 2048)
    pub max_tokens: usize,

    /// System prompt for context
    pub system_prompt: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            system_prompt: None,
        }
    }
}

impl LLMConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Request to an LLM provider
#[derive(Debug, Clone)]
pub struct LLMRequest {
    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// Temperature for generation (0.0-2.0)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,
}

impl LLMRequest {
    /// Build a request from a prompt and generation settings
    pub fn from_prompt(prompt: impl Into<String>, config: &LLMConfig) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = &config.system_prompt {
            messages.push(Message {
                role: MessageRole::System,
                content: system_prompt.clone(),
            });
        }
        messages.push(Message {
            role: MessageRole::User,
            content: prompt.into(),
        });

        Self {
            messages,
            temperature: Some(config.temperature),
            max_tokens: Some(config.max_tokens),
        }
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Generated content
    pub content: String,

    /// Token usage information
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Trait for LLM provider implementations.
///
/// This is the only capability the tutoring core needs from a vendor: turn a
/// prompt into text. Implementors should report rate limits, timeouts and
/// server errors as [`MentorError::Transient`](crate::error::MentorError::Transient)
/// so the invoker retries them.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate text for a prompt.
    async fn generate(&self, prompt: &str, config: &LLMConfig) -> Result<String> {
        let request = LLMRequest::from_prompt(prompt, config);
        let response = self.generate_request(&request).await?;
        Ok(response.content)
    }

    /// Generate text from a structured request.
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse>;

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Map an HTTP status from a provider into the crate's error taxonomy
pub(crate) fn classify_status(
    provider: &str,
    status: reqwest::StatusCode,
    detail: &str,
) -> crate::error::MentorError {
    let message = format!("{} API error ({}): {}", provider, status, detail);
    if status.as_u16() == 429 || status.is_server_error() || status.as_u16() == 408 {
        crate::error::MentorError::Transient(message)
    } else {
        crate::error::MentorError::Provider(message)
    }
}

pub mod circuit_breaker;
pub mod factory;
pub mod invoker;
pub mod providers;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use factory::LLMProviderFactory;
pub use invoker::ResilientInvoker;
pub use retry::{RetryPolicy, RetryState, Sleeper, TokioSleeper, with_retry};
