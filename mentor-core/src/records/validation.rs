use serde::{Deserialize, Serialize};

use super::{Challenge, DomainRecord, Feedback, IdAllocator, LetterResponse};
use crate::error::{MentorError, Result};

/// One schema violation, addressed by a JSON-style field path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub path: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Schema checks for a record
pub trait Validate {
    /// Every violation found; empty when the record is valid
    fn violations(&self, ids: &IdAllocator) -> Vec<FieldViolation>;
}

fn require_text(violations: &mut Vec<FieldViolation>, path: &str, value: &str) {
    if value.trim().is_empty() {
        violations.push(FieldViolation::new(path, "must not be empty"));
    }
}

fn require_items(violations: &mut Vec<FieldViolation>, path: &str, items: &[String]) {
    for (i, item) in items.iter().enumerate() {
        if item.trim().is_empty() {
            violations.push(FieldViolation::new(format!("{}[{}]", path, i), "must not be blank"));
        }
    }
}

impl Validate for Challenge {
    fn violations(&self, ids: &IdAllocator) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        if !ids.is_valid(&self.id) {
            violations.push(FieldViolation::new(
                "id",
                format!("'{}' does not match {}-NNN", self.id, ids.prefix()),
            ));
        }
        require_text(&mut violations, "title", &self.title);
        require_text(&mut violations, "description", &self.description);
        if self.topics.is_empty() {
            violations.push(FieldViolation::new("topics", "must contain at least one topic"));
        }
        require_items(&mut violations, "topics", &self.topics);
        require_items(&mut violations, "requirements", &self.requirements);
        require_items(&mut violations, "examples", &self.examples);
        require_items(&mut violations, "hints", &self.hints);
        require_items(&mut violations, "options", &self.options);
        if !(1..=10).contains(&self.difficulty) {
            violations.push(FieldViolation::new(
                "difficulty",
                format!("{} is outside 1..=10", self.difficulty),
            ));
        }

        violations
    }
}

impl Validate for Feedback {
    fn violations(&self, ids: &IdAllocator) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        if !ids.is_valid(&self.submission_id) {
            violations.push(FieldViolation::new(
                "submissionId",
                format!("'{}' does not match {}-NNN", self.submission_id, ids.prefix()),
            ));
        }
        require_items(&mut violations, "strengths", &self.strengths);
        require_items(&mut violations, "weaknesses", &self.weaknesses);
        require_items(&mut violations, "suggestions", &self.suggestions);
        if let Some(score) = self.score {
            if score > 100 {
                violations.push(FieldViolation::new("score", format!("{} is above 100", score)));
            }
        }
        require_text(&mut violations, "improvementPath", &self.improvement_path);

        violations
    }
}

impl Validate for LetterResponse {
    fn violations(&self, _ids: &IdAllocator) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        require_text(&mut violations, "content", &self.content);

        let insights = &self.insights;
        for (path, items) in [
            ("insights.strengths", &insights.strengths),
            ("insights.weaknesses", &insights.weaknesses),
            ("insights.topics", &insights.topics),
            ("insights.flags", &insights.flags),
        ] {
            if let Some(items) = items {
                require_items(&mut violations, path, items);
            }
        }
        if let Some(sentiment) = &insights.sentiment {
            require_text(&mut violations, "insights.sentiment", sentiment);
        }

        violations
    }
}

impl Validate for DomainRecord {
    fn violations(&self, ids: &IdAllocator) -> Vec<FieldViolation> {
        match self {
            DomainRecord::Challenge(c) => c.violations(ids),
            DomainRecord::Feedback(f) => f.violations(ids),
            DomainRecord::LetterResponse(l) => l.violations(ids),
        }
    }
}

impl DomainRecord {
    /// Check the record against its schema.
    ///
    /// # Errors
    ///
    /// Returns [`MentorError::Validation`] listing every offending field path.
    pub fn validate(&self, ids: &IdAllocator) -> Result<()> {
        let violations = self.violations(ids);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(MentorError::Validation {
                record: self.kind().to_string(),
                violations,
            })
        }
    }
}
