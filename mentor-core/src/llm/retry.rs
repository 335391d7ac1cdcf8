//! Retry Logic for LLM Providers
//!
//! Implements exponential backoff with uniform jitter for transient failures.
//! Both the policy and the sleeper are injectable so tests can run against a
//! recording clock instead of real delays.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{MentorError, Result};

/// Default number of attempts per invocation
pub const MAX_RETRIES: usize = 3;

/// Default base delay before the first retry
pub const BASE_DELAY_MS: u64 = 1_000;

/// Retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: usize,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound on the un-jittered delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Jitter as a fraction of the delay (0.1 = ±10%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Builder: set max attempts
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Builder: set base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Builder: set max delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Builder: set jitter fraction (clamped to 0.0..=1.0)
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retrying after failed attempt `attempt` (1-indexed), without jitter
    pub fn nominal_delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let millis = self.base_delay.as_millis() as f64 * 2f64.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay before retrying after failed attempt `attempt` (1-indexed)
    pub fn backoff(&self, attempt: usize) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if self.jitter.is_nan() || self.jitter <= 0.0 {
            return nominal;
        }

        let jitter = self.jitter.min(1.0);
        let factor = 1.0 + rand::thread_rng().gen_range(-jitter..=jitter);
        Duration::from_secs_f64(nominal.as_secs_f64() * factor)
    }
}

/// Suspends the current task between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry state tracker
#[derive(Debug)]
pub struct RetryState {
    max_attempts: usize,
    attempt: usize,
    last_error: Option<String>,
}

impl RetryState {
    /// Create a new retry state
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts.max(1),
            attempt: 0,
            last_error: None,
        }
    }

    /// Check if another attempt is allowed
    pub fn should_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Record a failed attempt
    pub fn record_attempt(&mut self, error: impl Into<String>) {
        self.attempt += 1;
        self.last_error = Some(error.into());
    }

    /// Number of attempts made so far
    pub fn attempts(&self) -> usize {
        self.attempt
    }

    /// Get remaining attempts
    pub fn remaining_attempts(&self) -> usize {
        self.max_attempts.saturating_sub(self.attempt)
    }

    /// Get the last error
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// Execute an async operation with retries.
///
/// Transient errors are retried until the policy runs out of attempts, at which
/// point [`MentorError::InvocationExhausted`] is returned. Any other error is
/// returned as-is right away.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut state = RetryState::new(policy);

    loop {
        tracing::debug!(
            operation = operation_name,
            attempt = state.attempts() + 1,
            max_attempts = policy.max_attempts,
            "Invoking LLM"
        );

        match operation().await {
            Ok(result) => {
                if state.attempts() > 0 {
                    tracing::info!(
                        operation = operation_name,
                        attempt = state.attempts() + 1,
                        "LLM invocation recovered"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_transient() => {
                state.record_attempt(e.to_string());
                tracing::warn!(
                    operation = operation_name,
                    attempt = state.attempts(),
                    remaining = state.remaining_attempts(),
                    error = %e,
                    "LLM invocation failed"
                );

                if !state.should_retry() {
                    return Err(MentorError::InvocationExhausted {
                        operation: operation_name.to_string(),
                        attempts: state.attempts(),
                        last_error: state.last_error().unwrap_or_default().to_string(),
                    });
                }

                let delay = policy.backoff(state.attempts());
                tracing::debug!(
                    operation = operation_name,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                sleeper.sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(
                    operation = operation_name,
                    attempt = state.attempts() + 1,
                    error = %e,
                    "LLM invocation failed with a non-retryable error"
                );
                return Err(e);
            }
        }
    }
}
