//! Core extraction trait and error types

use serde_json::{Map, Value};
use thiserror::Error;

use crate::records::RecordKind;

/// Error type for parsing operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Empty input
    #[error("Empty model response")]
    EmptyInput,

    /// No strategy produced every essential field
    #[error("missing essential fields for {record}: {}", .fields.join(", "))]
    MissingEssential { record: String, fields: Vec<String> },

    /// Invalid format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Raw fields pulled out of a model reply, keyed by record field name
pub type ExtractedFields = Map<String, Value>;

/// One way of pulling structured fields out of semi-structured model text.
///
/// Strategies are tried in priority order; a strategy returns `None` when the
/// text does not contain its format at all.
pub trait ExtractionStrategy: Send + Sync {
    /// Strategy name for logs and diagnostics
    fn name(&self) -> &'static str;

    /// Extract the fields relevant to `kind`
    fn extract(&self, raw: &str, kind: RecordKind) -> Option<ExtractedFields>;
}

/// Fields without which a record of `kind` cannot be built
pub fn essential_fields(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Challenge => &["title", "description", "topics"],
        RecordKind::Feedback => &["strengths", "weaknesses", "suggestions"],
        RecordKind::LetterResponse => &["content"],
    }
}

/// Essential fields that are absent, null or blank in `fields`.
///
/// An empty list counts as missing except for feedback, where a review may
/// legitimately have nothing to say under one heading.
pub fn missing_essentials(fields: &ExtractedFields, kind: RecordKind) -> Vec<String> {
    essential_fields(kind)
        .iter()
        .copied()
        .filter(|name| match fields.get(*name) {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty() && kind != RecordKind::Feedback,
            Some(_) => false,
        })
        .map(|name| name.to_string())
        .collect()
}
