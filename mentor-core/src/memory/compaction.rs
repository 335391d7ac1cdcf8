//! Compaction of overflowing note sections
//!
//! Truncation is always available. When an LLM invoker is attached the policy
//! first asks it to condense the text, guarded by a circuit breaker so that a
//! failing provider is not called for every overflow.

use thiserror::Error;

use super::section::{char_len, keep_tail};
use crate::config::CompactionConfig;
use crate::error::MentorError;
use crate::llm::{CircuitBreaker, CircuitBreakerConfig, CircuitState, ResilientInvoker};
use crate::prompt::summarization_prompt;

/// Prefix marking text that was cut instead of summarized
pub const TRUNCATION_MARKER: &str = "[Summary unavailable - truncated] ";

/// Share of the limit the summarizer is asked to aim for
pub const SUMMARY_TARGET_RATIO: f64 = 0.9;

/// Why an AI summary was not used. Never leaves this module's callers; every
/// variant ends in the truncation fallback.
#[derive(Debug, Error)]
pub enum SummarizationError {
    #[error("AI summaries are disabled")]
    Disabled,

    #[error("summarization circuit is open")]
    CircuitOpen,

    #[error("summarization call failed: {0}")]
    Invocation(#[from] MentorError),

    #[error("summary was empty")]
    Empty,

    #[error("summary has {len} characters, limit is {limit}")]
    TooLong { len: usize, limit: usize },
}

/// Shrinks text to a character limit
pub struct CompactionPolicy {
    summarizer: Option<ResilientInvoker>,
    breaker: CircuitBreaker,
}

impl CompactionPolicy {
    /// Policy that only ever truncates
    pub fn truncating() -> Self {
        Self {
            summarizer: None,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }

    /// Policy that summarizes through `invoker` before falling back to
    /// truncation
    pub fn summarizing(invoker: ResilientInvoker, config: &CompactionConfig) -> Self {
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::default()
                .with_failure_threshold(config.failure_threshold)
                .with_reset_timeout(config.cooldown),
        );
        Self {
            summarizer: Some(invoker),
            breaker,
        }
    }

    /// Build from configuration; AI summaries need both the flag and an invoker
    pub fn from_config(invoker: Option<ResilientInvoker>, config: &CompactionConfig) -> Self {
        match invoker {
            Some(invoker) if config.ai_summaries => Self::summarizing(invoker, config),
            _ => Self::truncating(),
        }
    }

    pub fn uses_ai(&self) -> bool {
        self.summarizer.is_some()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// `text` if it fits in `limit` characters, otherwise a condensed form
    pub async fn compact(&self, text: &str, limit: usize) -> String {
        if char_len(text) <= limit {
            return text.to_string();
        }
        self.condense(text, limit).await
    }

    /// Condense `text` to at most `limit` characters, summarizing even when it
    /// already fits.
    ///
    /// Never fails: when no summary is available the tail of the text is kept
    /// behind [`TRUNCATION_MARKER`].
    pub async fn condense(&self, text: &str, limit: usize) -> String {
        match self.summarize(text, limit).await {
            Ok(summary) => summary,
            Err(SummarizationError::Disabled) => truncate_with_marker(text, limit),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    chars = char_len(text),
                    limit,
                    "Summarization unavailable, truncating notes"
                );
                truncate_with_marker(text, limit)
            }
        }
    }

    async fn summarize(&self, text: &str, limit: usize) -> Result<String, SummarizationError> {
        let invoker = self.summarizer.as_ref().ok_or(SummarizationError::Disabled)?;
        if !self.breaker.is_allowed() {
            return Err(SummarizationError::CircuitOpen);
        }

        let target = ((limit as f64) * SUMMARY_TARGET_RATIO) as usize;
        let outcome = match summarization_prompt(text, target) {
            Ok(prompt) => invoker
                .invoke("summarize_notes", &prompt)
                .await
                .map_err(SummarizationError::from)
                .and_then(|reply| check_summary(reply.trim(), limit)),
            Err(e) => Err(e.into()),
        };

        match &outcome {
            Ok(summary) => {
                self.breaker.record_success();
                tracing::debug!(
                    from = char_len(text),
                    to = char_len(summary),
                    "Summarized notes"
                );
            }
            Err(_) => self.breaker.record_failure(),
        }
        outcome
    }
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self::truncating()
    }
}

fn check_summary(summary: &str, limit: usize) -> Result<String, SummarizationError> {
    let len = char_len(summary);
    if len == 0 {
        Err(SummarizationError::Empty)
    } else if len > limit {
        Err(SummarizationError::TooLong { len, limit })
    } else {
        Ok(summary.to_string())
    }
}

/// The tail of `text` behind [`TRUNCATION_MARKER`], at most `limit`
/// characters. Text that already fits is returned unchanged.
pub fn truncate_with_marker(text: &str, limit: usize) -> String {
    if char_len(text) <= limit {
        return text.to_string();
    }
    let marker_len = char_len(TRUNCATION_MARKER);
    if limit <= marker_len {
        return keep_tail(text, limit).to_string();
    }
    format!(
        "{}{}",
        TRUNCATION_MARKER,
        keep_tail(text, limit - marker_len).trim_start()
    )
}
