//! Domain records produced by the pipeline
//!
//! Every record leaving the response parser has been validated against its
//! schema. Persistence is delegated to a [`RecordStore`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod ids;
mod render;
mod store;
mod validation;

pub use ids::IdAllocator;
pub use store::{DirectoryRecordStore, InMemoryRecordStore, RecordIndex, RecordStore};
pub use validation::{FieldViolation, Validate};

/// Exact H2 heading texts shared by prompts, the heading extractor and renderers
pub mod headings {
    pub const DESCRIPTION: &str = "Description";
    pub const REQUIREMENTS: &str = "Requirements";
    pub const EXAMPLES: &str = "Examples";
    pub const HINTS: &str = "Hints";
    pub const OPTIONS: &str = "Options";
    pub const TOPICS: &str = "Topics";
    pub const DIFFICULTY: &str = "Difficulty";
    pub const STRENGTHS: &str = "Strengths";
    pub const WEAKNESSES: &str = "Weaknesses";
    pub const SUGGESTIONS: &str = "Suggestions";
    pub const SCORE: &str = "Score";
    pub const IMPROVEMENT_PATH: &str = "Improvement Path";
    pub const RESPONSE: &str = "Response";
    pub const SENTIMENT: &str = "Sentiment";
    pub const FLAGS: &str = "Flags";
}

/// Record variants the parser can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Challenge,
    Feedback,
    LetterResponse,
}

impl RecordKind {
    pub fn name(&self) -> &'static str {
        match self {
            RecordKind::Challenge => "challenge",
            RecordKind::Feedback => "feedback",
            RecordKind::LetterResponse => "letter_response",
        }
    }

    /// Directory name used by file-backed stores
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Challenge => "challenges",
            RecordKind::Feedback => "feedback",
            RecordKind::LetterResponse => "letters",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A coding challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    /// Answer options for multiple-choice challenges
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub difficulty: u8,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Review of a student's submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub submission_id: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Absent when the model gave no score; consumers pick their own default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    pub improvement_path: String,
    pub created_at: DateTime<Utc>,
}

/// Reply to a student's letter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterResponse {
    pub content: String,
    #[serde(default)]
    pub insights: LetterInsights,
}

/// Observations about the student extracted while answering a letter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterInsights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strengths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weaknesses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    /// Suggested change of the student's level, usually -2..=2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_level_adjustment: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<String>>,
}

impl LetterInsights {
    pub fn is_empty(&self) -> bool {
        self == &LetterInsights::default()
    }
}

/// A student's answer to a challenge, handed to feedback generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub challenge_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Validated output of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainRecord {
    Challenge(Challenge),
    Feedback(Feedback),
    LetterResponse(LetterResponse),
}

impl DomainRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            DomainRecord::Challenge(_) => RecordKind::Challenge,
            DomainRecord::Feedback(_) => RecordKind::Feedback,
            DomainRecord::LetterResponse(_) => RecordKind::LetterResponse,
        }
    }

    pub fn as_challenge(&self) -> Option<&Challenge> {
        match self {
            DomainRecord::Challenge(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_feedback(&self) -> Option<&Feedback> {
        match self {
            DomainRecord::Feedback(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_letter_response(&self) -> Option<&LetterResponse> {
        match self {
            DomainRecord::LetterResponse(l) => Some(l),
            _ => None,
        }
    }

    pub fn into_challenge(self) -> Option<Challenge> {
        match self {
            DomainRecord::Challenge(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_feedback(self) -> Option<Feedback> {
        match self {
            DomainRecord::Feedback(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_letter_response(self) -> Option<LetterResponse> {
        match self {
            DomainRecord::LetterResponse(l) => Some(l),
            _ => None,
        }
    }
}
