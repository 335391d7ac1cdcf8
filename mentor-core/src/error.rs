//! Error types for Mentor operations

use crate::parsing::ParseError;
use crate::records::FieldViolation;

/// Result type for Mentor operations
pub type Result<T> = std::result::Result<T, MentorError>;

/// Error types for the tutoring pipeline
#[derive(Debug, thiserror::Error)]
pub enum MentorError {
    /// Network or rate-limit class failure talking to the LLM; retried by the invoker
    #[error("Transient LLM failure: {0}")]
    Transient(String),

    /// Provider rejected the request in a way retrying cannot fix
    #[error("LLM provider error: {0}")]
    Provider(String),

    /// Every attempt of an invocation failed
    #[error("{operation}: LLM invocation failed after {attempts} attempts: {last_error}")]
    InvocationExhausted {
        operation: String,
        attempts: usize,
        last_error: String,
    },

    /// Model output lacks the fields needed to build a record
    #[error("Parse failure: {0}")]
    Parse(#[from] ParseError),

    /// Record was extracted but breaks its schema
    #[error("Validation failed for {record}: {}", format_violations(.violations))]
    Validation {
        record: String,
        violations: Vec<FieldViolation>,
    },

    /// Prompt could not be composed from the given parts
    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    /// Record persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Memory document could not be read or written
    #[error("Memory error: {0}")]
    Memory(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl MentorError {
    /// Whether the resilient invoker should try again after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, MentorError::Transient(_))
    }
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<String> for MentorError {
    fn from(s: String) -> Self {
        MentorError::Other(s)
    }
}

impl From<&str> for MentorError {
    fn from(s: &str) -> Self {
        MentorError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for MentorError {
    fn from(err: anyhow::Error) -> Self {
        MentorError::Other(err.to_string())
    }
}
