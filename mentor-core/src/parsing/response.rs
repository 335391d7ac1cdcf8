//! Response Parser: raw model text to a validated domain record

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};

use super::json::{FencedJsonStrategy, LooseJsonStrategy};
use super::markdown::{HeadingStrategy, comma_items, list_items};
use super::parser::{ExtractedFields, ExtractionStrategy, ParseError, missing_essentials};
use crate::config::ParserConfig;
use crate::error::Result;
use crate::records::{
    Challenge, DomainRecord, Feedback, IdAllocator, LetterInsights, LetterResponse, RecordIndex,
    RecordKind,
};

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number regex"));

/// The record shape the caller expects back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSchema {
    Challenge,
    /// Feedback on the submission for challenge `submission_id`
    Feedback { submission_id: String },
    LetterResponse,
}

impl RecordSchema {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordSchema::Challenge => RecordKind::Challenge,
            RecordSchema::Feedback { .. } => RecordKind::Feedback,
            RecordSchema::LetterResponse => RecordKind::LetterResponse,
        }
    }
}

/// A validated record with parse diagnostics
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub record: DomainRecord,
    /// Name of the extraction strategy that won
    pub strategy: &'static str,
    /// Defaults and clamps applied while normalizing
    pub warnings: Vec<String>,
}

/// Parses model replies into validated records.
///
/// Strategies are tried in priority order and the first one yielding every
/// essential field wins.
pub struct ResponseParser {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    config: ParserConfig,
    ids: IdAllocator,
    index: Arc<dyn RecordIndex>,
}

impl ResponseParser {
    /// Create a parser with the default strategy order:
    /// heading Markdown, fenced JSON, loose JSON
    pub fn new(config: ParserConfig, index: Arc<dyn RecordIndex>) -> Result<Self> {
        let ids = IdAllocator::new(config.challenge_id_prefix.clone())?;
        Ok(Self {
            strategies: vec![
                Box::new(HeadingStrategy),
                Box::new(FencedJsonStrategy),
                Box::new(LooseJsonStrategy),
            ],
            config,
            ids,
            index,
        })
    }

    /// Replace the strategy list
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Parse `raw` into the record described by `schema`.
    ///
    /// # Errors
    ///
    /// [`MentorError::Parse`](crate::error::MentorError::Parse) when no strategy
    /// finds every essential field, [`MentorError::Validation`](crate::error::MentorError::Validation)
    /// when the normalized record breaks its schema.
    pub async fn parse(&self, raw: &str, schema: &RecordSchema) -> Result<ParsedResponse> {
        if raw.trim().is_empty() {
            return Err(ParseError::EmptyInput.into());
        }

        let kind = schema.kind();
        let (strategy, fields) = self.extract(raw, kind)?;
        tracing::debug!(kind = %kind, strategy, "Extracted response fields");

        let mut warnings = Vec::new();
        let record = match schema {
            RecordSchema::Challenge => {
                DomainRecord::Challenge(self.challenge(&fields, &mut warnings).await?)
            }
            RecordSchema::Feedback { submission_id } => {
                DomainRecord::Feedback(self.feedback(&fields, submission_id, &mut warnings))
            }
            RecordSchema::LetterResponse => {
                DomainRecord::LetterResponse(letter(&fields, &mut warnings))
            }
        };

        for warning in &warnings {
            tracing::warn!(kind = %kind, strategy, warning = %warning, "Normalized model output");
        }

        record.validate(&self.ids)?;

        Ok(ParsedResponse {
            record,
            strategy,
            warnings,
        })
    }

    /// First strategy whose fields include every essential one
    fn extract(
        &self,
        raw: &str,
        kind: RecordKind,
    ) -> std::result::Result<(&'static str, ExtractedFields), ParseError> {
        let mut best: Option<Vec<String>> = None;

        for strategy in &self.strategies {
            let Some(fields) = strategy.extract(raw, kind) else {
                tracing::debug!(strategy = strategy.name(), "Strategy found no structure");
                continue;
            };
            let missing = missing_essentials(&fields, kind);
            if missing.is_empty() {
                return Ok((strategy.name(), fields));
            }
            tracing::debug!(
                strategy = strategy.name(),
                missing = ?missing,
                "Strategy lacks essential fields"
            );
            if best.as_ref().is_none_or(|b| missing.len() < b.len()) {
                best = Some(missing);
            }
        }

        let fields = best.unwrap_or_else(|| {
            super::parser::essential_fields(kind)
                .iter()
                .map(|f| f.to_string())
                .collect()
        });
        Err(ParseError::MissingEssential {
            record: kind.to_string(),
            fields,
        })
    }

    async fn challenge(
        &self,
        fields: &ExtractedFields,
        warnings: &mut Vec<String>,
    ) -> Result<Challenge> {
        let existing = self.index.list_ids(RecordKind::Challenge).await?;
        // Ids collide on their number, so CC-0007 is taken once CC-007 exists
        let taken = |id: &str| {
            let suffix = self.ids.suffix(id);
            existing
                .iter()
                .any(|other| other == id || (suffix.is_some() && self.ids.suffix(other) == suffix))
        };

        let id = match text(fields, "id") {
            Some(id) if self.ids.is_valid(&id) && !taken(&id) => id,
            candidate => {
                let assigned = self.ids.next_id(existing.iter().map(String::as_str));
                match candidate {
                    Some(bad) if self.ids.is_valid(&bad) => warnings.push(format!(
                        "challenge id '{}' already exists; assigned {}",
                        bad, assigned
                    )),
                    Some(bad) => warnings.push(format!(
                        "challenge id '{}' is malformed; assigned {}",
                        bad, assigned
                    )),
                    None => tracing::debug!(id = %assigned, "Assigned challenge id"),
                }
                assigned
            }
        };

        Ok(Challenge {
            id,
            title: text(fields, "title").unwrap_or_default(),
            description: text(fields, "description").unwrap_or_default(),
            requirements: list(fields, "requirements"),
            examples: list(fields, "examples"),
            hints: list(fields, "hints"),
            options: list(fields, "options"),
            difficulty: self.difficulty(fields, warnings),
            topics: topics(fields.get("topics")),
            created_at: created_at(fields, warnings),
        })
    }

    fn difficulty(&self, fields: &ExtractedFields, warnings: &mut Vec<String>) -> u8 {
        let default = self.config.default_difficulty;
        match number(fields, "difficulty") {
            None => {
                if fields.get("difficulty").is_some_and(|v| !v.is_null()) {
                    warnings.push(format!("difficulty is not a number; using default {}", default));
                } else {
                    warnings.push(format!("difficulty missing; using default {}", default));
                }
                default
            }
            Some(value) => clamp(value, 1, 10, "difficulty", warnings),
        }
    }

    fn feedback(
        &self,
        fields: &ExtractedFields,
        submission_id: &str,
        warnings: &mut Vec<String>,
    ) -> Feedback {
        if let Some(claimed) = text(fields, "submissionId").filter(|id| id != submission_id) {
            warnings.push(format!(
                "reply names submission '{}'; using '{}'",
                claimed, submission_id
            ));
        }

        let score = match number(fields, "score") {
            Some(value) => Some(clamp(value, 0, 100, "score", warnings)),
            None => {
                if fields.get("score").is_some_and(|v| !v.is_null()) {
                    warnings.push("score is not a number; leaving it unset".to_string());
                }
                None
            }
        };

        let improvement_path = text(fields, "improvementPath")
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| self.config.default_improvement_path.clone());

        Feedback {
            submission_id: submission_id.to_string(),
            strengths: list(fields, "strengths"),
            weaknesses: list(fields, "weaknesses"),
            suggestions: list(fields, "suggestions"),
            score,
            improvement_path,
            created_at: created_at(fields, warnings),
        }
    }
}

fn letter(fields: &ExtractedFields, warnings: &mut Vec<String>) -> LetterResponse {
    let insights = match fields.get("insights") {
        None | Some(Value::Null) => LetterInsights::default(),
        Some(Value::Object(map)) => letter_insights(map, warnings),
        Some(_) => {
            warnings.push("insights is not an object; ignoring it".to_string());
            LetterInsights::default()
        }
    };

    LetterResponse {
        content: text(fields, "content").unwrap_or_default(),
        insights,
    }
}

fn letter_insights(map: &Map<String, Value>, warnings: &mut Vec<String>) -> LetterInsights {
    let optional_list = |key: &str| map.contains_key(key).then(|| list(map, key));

    let skill_level_adjustment = match number(map, "skillLevelAdjustment") {
        Some(value) => Some(value.round() as i32),
        None => {
            if map.get("skillLevelAdjustment").is_some_and(|v| !v.is_null()) {
                warnings.push("insights.skillLevelAdjustment is not a number; ignoring it".to_string());
            }
            None
        }
    };

    LetterInsights {
        strengths: optional_list("strengths"),
        weaknesses: optional_list("weaknesses"),
        topics: map.contains_key("topics").then(|| topics(map.get("topics"))),
        sentiment: text(map, "sentiment").filter(|s| !s.is_empty()),
        skill_level_adjustment,
        flags: optional_list("flags"),
    }
}

/// Scalar text; lists are joined by newlines
fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(item_text)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Value::Null | Value::Object(_) => None,
    }
}

fn item_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// List field; blank items are dropped
fn list(fields: &Map<String, Value>, key: &str) -> Vec<String> {
    let items = match fields.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(item_text).collect(),
        Some(Value::String(s)) => list_items(s),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other.to_string()],
    };
    items.into_iter().filter(|item| !item.trim().is_empty()).collect()
}

fn topics(value: Option<&Value>) -> Vec<String> {
    let items = match value {
        Some(Value::Array(items)) => items.iter().filter_map(item_text).collect(),
        Some(Value::String(s)) => comma_items(s),
        _ => Vec::new(),
    };
    items.into_iter().filter(|item| !item.trim().is_empty()).collect()
}

/// First numeric token of a number or string field
fn number(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => NUMBER_RE.find(s).and_then(|m| m.as_str().parse().ok()),
        _ => None,
    }
}

fn clamp(value: f64, min: u8, max: u8, field: &str, warnings: &mut Vec<String>) -> u8 {
    let rounded = value.round();
    if rounded < f64::from(min) || rounded > f64::from(max) {
        let clamped = rounded.clamp(f64::from(min), f64::from(max)) as u8;
        warnings.push(format!(
            "{} {} is outside {}..={}; clamped to {}",
            field, value, min, max, clamped
        ));
        clamped
    } else {
        rounded as u8
    }
}

fn created_at(fields: &ExtractedFields, warnings: &mut Vec<String>) -> DateTime<Utc> {
    match text(fields, "createdAt") {
        None => Utc::now(),
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(_) => {
                warnings.push(format!("createdAt '{}' is not RFC 3339; using now", raw));
                Utc::now()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MentorError;
    use crate::records::{DomainRecord, InMemoryRecordStore, RecordStore};
    use chrono::Utc;

    fn parser_with(store: Arc<InMemoryRecordStore>) -> ResponseParser {
        ResponseParser::new(ParserConfig::default(), store).unwrap()
    }

    fn parser() -> ResponseParser {
        parser_with(Arc::new(InMemoryRecordStore::new()))
    }

    fn stored_challenge(id: &str) -> (String, DomainRecord) {
        (
            id.to_string(),
            DomainRecord::Challenge(Challenge {
                id: id.to_string(),
                title: "Old".to_string(),
                description: "Old one".to_string(),
                requirements: vec![],
                examples: vec![],
                hints: vec![],
                options: vec![],
                difficulty: 2,
                topics: vec!["old".to_string()],
                created_at: Utc::now(),
            }),
        )
    }

    const CHALLENGE_MD: &str = "# Two Sum\n\n## Description\nFind two numbers adding to a target.\n\n## Requirements\n- O(n) time\n\n## Topics\narrays, hashing\n\n## Difficulty\n4";

    #[tokio::test]
    async fn test_heading_challenge_gets_next_id() {
        let store = Arc::new(InMemoryRecordStore::new());
        store
            .seed([stored_challenge("CC-005"), stored_challenge("CC-007")])
            .await;

        let parsed = parser_with(store)
            .parse(CHALLENGE_MD, &RecordSchema::Challenge)
            .await
            .unwrap();
        let challenge = parsed.record.as_challenge().unwrap();

        assert_eq!(parsed.strategy, "heading");
        assert_eq!(challenge.id, "CC-008");
        assert_eq!(challenge.title, "Two Sum");
        assert_eq!(challenge.topics, vec!["arrays", "hashing"]);
        assert_eq!(challenge.difficulty, 4);
        assert!(parsed.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_topics_is_essential_failure() {
        let raw = "# Two Sum\n\n## Description\nFind two numbers.";
        let err = parser()
            .parse(raw, &RecordSchema::Challenge)
            .await
            .unwrap_err();

        assert!(matches!(err, MentorError::Parse(ParseError::MissingEssential { .. })));
        assert!(err.to_string().contains("essential"));
        assert!(err.to_string().contains("topics"));
    }

    #[tokio::test]
    async fn test_falls_back_to_fenced_json() {
        let raw = "Here is your challenge:\n```json\n{\"title\": \"FizzBuzz\", \"description\": \"Classic.\", \"topics\": \"loops, modulo\", \"difficulty\": 14, \"id\": \"challenge-1\"}\n```";
        let parsed = parser().parse(raw, &RecordSchema::Challenge).await.unwrap();
        let challenge = parsed.record.as_challenge().unwrap();

        assert_eq!(parsed.strategy, "fenced_json");
        assert_eq!(challenge.id, "CC-001");
        assert_eq!(challenge.topics, vec!["loops", "modulo"]);
        assert_eq!(challenge.difficulty, 10);
        assert_eq!(parsed.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_colliding_id_reassigned() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.seed([stored_challenge("CC-001")]).await;

        let raw = r#"{"id": "CC-001", "title": "T", "description": "D", "topics": ["x"], "difficulty": 3}"#;
        let parsed = parser_with(store)
            .parse(raw, &RecordSchema::Challenge)
            .await
            .unwrap();

        assert_eq!(parsed.strategy, "loose_json");
        assert_eq!(parsed.record.as_challenge().unwrap().id, "CC-002");
        assert!(parsed.warnings[0].contains("already exists"));
    }

    #[tokio::test]
    async fn test_missing_difficulty_uses_default() {
        let raw = "# T\n## Description\nD\n## Topics\nx";
        let parsed = parser().parse(raw, &RecordSchema::Challenge).await.unwrap();

        assert_eq!(parsed.record.as_challenge().unwrap().difficulty, 5);
        assert!(parsed.warnings[0].contains("difficulty missing"));
    }

    #[tokio::test]
    async fn test_feedback_uses_schema_submission_id() {
        let raw = "## Strengths\n- Clear\n## Weaknesses\n- Slow\n## Suggestions\n- Cache results\n## Score\n85/100";
        let schema = RecordSchema::Feedback {
            submission_id: "CC-004".to_string(),
        };
        let parsed = parser().parse(raw, &schema).await.unwrap();
        let feedback = parsed.record.as_feedback().unwrap();

        assert_eq!(feedback.submission_id, "CC-004");
        assert_eq!(feedback.score, Some(85));
        assert_eq!(
            feedback.improvement_path,
            ParserConfig::default().default_improvement_path
        );
    }

    #[tokio::test]
    async fn test_feedback_score_clamped() {
        let raw = r#"{"strengths": [], "weaknesses": ["a"], "suggestions": ["b"], "score": 140}"#;
        let schema = RecordSchema::Feedback {
            submission_id: "CC-010".to_string(),
        };
        let parsed = parser().parse(raw, &schema).await.unwrap();

        assert_eq!(parsed.record.as_feedback().unwrap().score, Some(100));
        assert!(parsed.warnings.iter().any(|w| w.contains("score")));
    }

    #[tokio::test]
    async fn test_feedback_for_malformed_submission_fails_validation() {
        let raw = r#"{"strengths": ["a"], "weaknesses": ["b"], "suggestions": ["c"]}"#;
        let schema = RecordSchema::Feedback {
            submission_id: "submission-9".to_string(),
        };
        let err = parser().parse(raw, &schema).await.unwrap_err();

        assert!(matches!(err, MentorError::Validation { .. }));
        assert!(err.to_string().contains("submissionId"));
    }

    #[tokio::test]
    async fn test_letter_from_json_with_insights() {
        let raw = r#"{"content": "Recursion clicks with practice.", "insights": {"topics": ["recursion"], "skill_level_adjustment": 1, "sentiment": "curious"}}"#;
        let parsed = parser()
            .parse(raw, &RecordSchema::LetterResponse)
            .await
            .unwrap();
        let letter = parsed.record.as_letter_response().unwrap();

        assert_eq!(letter.content, "Recursion clicks with practice.");
        assert_eq!(letter.insights.topics, Some(vec!["recursion".to_string()]));
        assert_eq!(letter.insights.skill_level_adjustment, Some(1));
        assert!(letter.insights.strengths.is_none());
    }

    #[tokio::test]
    async fn test_blank_letter_content_is_essential_failure() {
        let raw = r#"{"content": "   "}"#;
        let err = parser()
            .parse(raw, &RecordSchema::LetterResponse)
            .await
            .unwrap_err();
        assert!(matches!(err, MentorError::Parse(ParseError::MissingEssential { .. })));
        assert!(err.to_string().contains("content"));
    }

    #[tokio::test]
    async fn test_empty_topics_section_is_essential_failure() {
        let raw = "# Two Sum\n\n## Description\nFind two numbers.\n\n## Topics\n";
        let err = parser()
            .parse(raw, &RecordSchema::Challenge)
            .await
            .unwrap_err();

        match err {
            MentorError::Parse(ParseError::MissingEssential { fields, .. }) => {
                assert_eq!(fields, vec!["topics"]);
            }
            other => panic!("expected a missing essential field, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_json_under_topics_heading_falls_through() {
        let raw = "## Topics\n```json\n{\"title\": \"FizzBuzz\", \"description\": \"Classic.\", \"topics\": [\"loops\"], \"difficulty\": 2}\n```";
        let parsed = parser().parse(raw, &RecordSchema::Challenge).await.unwrap();
        let challenge = parsed.record.as_challenge().unwrap();

        assert_eq!(parsed.strategy, "fenced_json");
        assert_eq!(challenge.title, "FizzBuzz");
        assert_eq!(challenge.topics, vec!["loops"]);
    }

    #[tokio::test]
    async fn test_zero_padded_id_collides_on_number() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.seed([stored_challenge("CC-007")]).await;

        let raw = r#"{"id": "CC-0007", "title": "T", "description": "D", "topics": ["t"], "difficulty": 3}"#;
        let parsed = parser_with(store)
            .parse(raw, &RecordSchema::Challenge)
            .await
            .unwrap();

        assert_eq!(parsed.record.as_challenge().unwrap().id, "CC-008");
        assert!(parsed.warnings.iter().any(|w| w.contains("already exists")));
    }

    #[tokio::test]
    async fn test_empty_reply() {
        let err = parser()
            .parse("  \n", &RecordSchema::LetterResponse)
            .await
            .unwrap_err();
        assert!(matches!(err, MentorError::Parse(ParseError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_unstructured_reply_names_all_essentials() {
        let err = parser()
            .parse("I cannot help with that.", &RecordSchema::Challenge)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse failure: missing essential fields for challenge: title, description, topics"
        );
    }

    #[tokio::test]
    async fn test_index_is_consulted_after_persist() {
        let store = Arc::new(InMemoryRecordStore::new());
        let parser = parser_with(store.clone());

        let first = parser.parse(CHALLENGE_MD, &RecordSchema::Challenge).await.unwrap();
        let id = first.record.as_challenge().unwrap().id.clone();
        store.persist(&id, &first.record).await.unwrap();

        let second = parser.parse(CHALLENGE_MD, &RecordSchema::Challenge).await.unwrap();
        assert_eq!(second.record.as_challenge().unwrap().id, "CC-002");
    }
}
