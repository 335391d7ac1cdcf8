//! Resilient invocation wrapper
//!
//! Sends prompts to an [`LLMProvider`] and retries transient failures according
//! to a [`RetryPolicy`].

use std::sync::Arc;

use super::retry::{RetryPolicy, Sleeper, TokioSleeper, with_retry};
use super::{LLMConfig, LLMProvider};
use crate::error::{MentorError, Result};

/// Provider wrapper that retries transient failures with backoff
#[derive(Clone)]
pub struct ResilientInvoker {
    provider: Arc<dyn LLMProvider>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    config: LLMConfig,
}

impl ResilientInvoker {
    /// Create an invoker with the default policy and the tokio sleeper
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            config: LLMConfig::default(),
        }
    }

    /// Replace the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the sleeper used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace the generation settings
    pub fn with_config(mut self, config: LLMConfig) -> Self {
        self.config = config;
        self
    }

    /// Retry policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generation settings in use
    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    /// Send `prompt` with the invoker's own generation settings.
    ///
    /// # Errors
    ///
    /// Returns [`MentorError::InvocationExhausted`] once every attempt failed
    /// transiently, or the provider's error when it is not retryable.
    pub async fn invoke(&self, operation: &str, prompt: &str) -> Result<String> {
        self.invoke_with(operation, prompt, &self.config).await
    }

    /// Send `prompt` with explicit generation settings.
    pub async fn invoke_with(
        &self,
        operation: &str,
        prompt: &str,
        config: &LLMConfig,
    ) -> Result<String> {
        let model = self.provider.model_info();
        tracing::debug!(
            operation,
            provider = %model.provider,
            model = %model.model_name,
            prompt_chars = prompt.chars().count(),
            "Dispatching prompt"
        );

        let provider = self.provider.as_ref();
        let text = with_retry(&self.policy, self.sleeper.as_ref(), operation, move || async move {
            let text = provider.generate(prompt, config).await?;
            if text.trim().is_empty() {
                return Err(MentorError::Transient(
                    "provider returned an empty response".to_string(),
                ));
            }
            Ok(text)
        })
        .await?;

        tracing::debug!(operation, response_chars = text.chars().count(), "Received response");
        Ok(text)
    }
}

impl std::fmt::Debug for ResilientInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientInvoker")
            .field("model", &self.provider.model_info().model_name)
            .field("policy", &self.policy)
            .field("config", &self.config)
            .finish()
    }
}
