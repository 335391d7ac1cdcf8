//! Pipeline orchestrator
//!
//! A [`Tutor`] runs the three pipeline operations end to end: read the
//! teacher's notes, compose a prompt, invoke the model, parse and validate the
//! reply, persist the record and log the event back into the notes.

use chrono::Utc;
use std::sync::Arc;

use crate::config::MentorConfig;
use crate::error::{MentorError, Result};
use crate::llm::{
    LLMConfig, LLMProvider, LLMProviderFactory, ResilientInvoker, Sleeper, TokioSleeper,
};
use crate::memory::{MemorySection, MemoryStore, SectionMode};
use crate::parsing::{ParsedResponse, RecordSchema, ResponseParser};
use crate::prompt::{ChallengeRequest, Persona, challenge_prompt, feedback_prompt, letter_prompt};
use crate::records::{
    Challenge, DirectoryRecordStore, DomainRecord, Feedback, LetterResponse, RecordStore,
    Submission,
};

/// A record produced by the pipeline with its parse diagnostics
#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub record: T,
    /// Storage key the record was persisted under
    pub key: String,
    /// Extraction strategy that read the reply
    pub strategy: &'static str,
    pub warnings: Vec<String>,
}

/// Runs challenge generation, feedback generation and letter processing
pub struct Tutor {
    invoker: ResilientInvoker,
    memory: Arc<MemoryStore>,
    parser: ResponseParser,
    records: Arc<dyn RecordStore>,
    persona: Option<Persona>,
}

impl Tutor {
    /// Create a new tutor builder
    pub fn builder() -> TutorBuilder {
        TutorBuilder::new()
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn invoker(&self) -> &ResilientInvoker {
        &self.invoker
    }

    pub fn persona(&self) -> Option<&Persona> {
        self.persona.as_ref()
    }

    /// Generate, validate and persist the student's next challenge
    pub async fn generate_challenge(&self, request: &ChallengeRequest) -> Result<Generated<Challenge>> {
        let notes = self.memory.render().await?;
        let prompt = challenge_prompt(self.persona.as_ref(), request, &notes)?;
        let raw = self.invoker.invoke("generate_challenge", &prompt).await?;
        let parsed = self.parser.parse(&raw, &RecordSchema::Challenge).await?;

        let (record, strategy, warnings) = into_parts(parsed);
        let challenge = record
            .into_challenge()
            .ok_or_else(|| MentorError::Other("parser returned a non-challenge record".to_string()))?;
        let key = challenge.id.clone();
        self.records
            .persist(&key, &DomainRecord::Challenge(challenge.clone()))
            .await?;

        tracing::info!(
            id = %challenge.id,
            difficulty = challenge.difficulty,
            strategy,
            "Generated challenge"
        );
        self.log_activity(challenge_activity(&challenge)).await;

        Ok(Generated {
            record: challenge,
            key,
            strategy,
            warnings,
        })
    }

    /// Review a submission against its challenge
    pub async fn generate_feedback(
        &self,
        challenge: &Challenge,
        submission: &Submission,
    ) -> Result<Generated<Feedback>> {
        if submission.challenge_id != challenge.id {
            return Err(MentorError::InvalidPrompt(format!(
                "submission is for {} but the challenge is {}",
                submission.challenge_id, challenge.id
            )));
        }

        let notes = self.memory.render().await?;
        let prompt = feedback_prompt(self.persona.as_ref(), challenge, submission, &notes)?;
        let raw = self.invoker.invoke("generate_feedback", &prompt).await?;
        let schema = RecordSchema::Feedback {
            submission_id: challenge.id.clone(),
        };
        let parsed = self.parser.parse(&raw, &schema).await?;

        let (record, strategy, warnings) = into_parts(parsed);
        let feedback = record
            .into_feedback()
            .ok_or_else(|| MentorError::Other("parser returned a non-feedback record".to_string()))?;
        let key = feedback.submission_id.clone();
        self.records
            .persist(&key, &DomainRecord::Feedback(feedback.clone()))
            .await?;

        tracing::info!(submission = %key, score = ?feedback.score, strategy, "Generated feedback");
        self.log_activity(feedback_activity(&feedback)).await;

        Ok(Generated {
            record: feedback,
            key,
            strategy,
            warnings,
        })
    }

    /// Answer a student's letter and record what it reveals
    pub async fn process_letter(&self, letter: &str) -> Result<Generated<LetterResponse>> {
        if letter.trim().is_empty() {
            return Err(MentorError::InvalidPrompt("letter is empty".to_string()));
        }

        let notes = self.memory.render().await?;
        let prompt = letter_prompt(self.persona.as_ref(), letter, &notes)?;
        let raw = self.invoker.invoke("process_letter", &prompt).await?;
        let parsed = self
            .parser
            .parse(&raw, &RecordSchema::LetterResponse)
            .await?;

        let (record, strategy, warnings) = into_parts(parsed);
        let response = record
            .into_letter_response()
            .ok_or_else(|| MentorError::Other("parser returned a non-letter record".to_string()))?;
        let key = format!("letter-{}", Utc::now().format("%Y%m%dT%H%M%S%3fZ"));
        self.records
            .persist(&key, &DomainRecord::LetterResponse(response.clone()))
            .await?;

        tracing::info!(key = %key, strategy, "Answered letter");
        self.log_activity(letter_activity(&response)).await;

        Ok(Generated {
            record: response,
            key,
            strategy,
            warnings,
        })
    }

    /// Append an event line to Recent Activity. The record is already
    /// persisted at this point, so a notes failure is logged, not returned.
    async fn log_activity(&self, line: String) {
        let entry = format!("- {}: {}", Utc::now().format("%Y-%m-%d"), line);
        if let Err(e) = self
            .memory
            .update(MemorySection::RecentActivity, &entry, SectionMode::Append)
            .await
        {
            tracing::warn!(error = %e, "Failed to record activity in teacher's notes");
        }
    }
}

impl std::fmt::Debug for Tutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tutor")
            .field("invoker", &self.invoker)
            .field("memory", &self.memory)
            .field("persona", &self.persona.as_ref().map(|p| &p.name))
            .finish()
    }
}

fn into_parts(parsed: ParsedResponse) -> (DomainRecord, &'static str, Vec<String>) {
    (parsed.record, parsed.strategy, parsed.warnings)
}

fn challenge_activity(challenge: &Challenge) -> String {
    format!(
        "Assigned {} \"{}\" (difficulty {}; topics: {})",
        challenge.id,
        challenge.title,
        challenge.difficulty,
        challenge.topics.join(", ")
    )
}

fn feedback_activity(feedback: &Feedback) -> String {
    let score = feedback
        .score
        .map(|s| format!("score {}/100", s))
        .unwrap_or_else(|| "unscored".to_string());
    let mut line = format!("Reviewed {} ({})", feedback.submission_id, score);
    if let Some(weakness) = feedback.weaknesses.first() {
        line.push_str(&format!("; main weakness: {}", first_line(weakness)));
    }
    line
}

fn letter_activity(response: &LetterResponse) -> String {
    let insights = &response.insights;
    let mut parts = vec!["Answered a letter".to_string()];
    if let Some(sentiment) = &insights.sentiment {
        parts.push(format!("sentiment: {}", sentiment));
    }
    if let Some(topics) = insights.topics.as_ref().filter(|t| !t.is_empty()) {
        parts.push(format!("topics: {}", topics.join(", ")));
    }
    if let Some(adjustment) = insights.skill_level_adjustment.filter(|a| *a != 0) {
        parts.push(format!("skill level {:+}", adjustment));
    }
    if let Some(flags) = insights.flags.as_ref().filter(|f| !f.is_empty()) {
        parts.push(format!("flags: {}", flags.join(", ")));
    }
    parts.join("; ")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

/// Builder for [`Tutor`]
pub struct TutorBuilder {
    config: Option<MentorConfig>,
    llm_provider: Option<Arc<dyn LLMProvider>>,
    records: Option<Arc<dyn RecordStore>>,
    memory: Option<Arc<MemoryStore>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl TutorBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            llm_provider: None,
            records: None,
            memory: None,
            sleeper: None,
        }
    }

    /// Set the full configuration (providers are created from it when not
    /// set explicitly)
    pub fn config(mut self, config: MentorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the LLM provider
    pub fn llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.llm_provider = Some(provider);
        self
    }

    /// Set the record store (defaults to a directory store at
    /// `records.data_dir`)
    pub fn records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Set the memory store (defaults to one built from `memory`)
    pub fn memory(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Set the sleeper used between retries
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Build the tutor
    pub fn build(self) -> Result<Tutor> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let provider = match self.llm_provider {
            Some(provider) => provider,
            None => LLMProviderFactory::from_config(config.llm.as_ref())?.ok_or_else(|| {
                MentorError::Configuration("no LLM provider configured".to_string())
            })?,
        };

        let persona = match &config.persona {
            Some(key) => Some(Persona::preset(key).ok_or_else(|| {
                MentorError::Configuration(format!(
                    "unknown persona '{}', expected one of: {}",
                    key,
                    Persona::preset_keys().join(", ")
                ))
            })?),
            None => None,
        };

        let generation = &config.generation;
        let invoker = ResilientInvoker::new(provider)
            .with_policy(config.retry.clone())
            .with_sleeper(self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)))
            .with_config(
                LLMConfig::new()
                    .with_temperature(generation.temperature)
                    .with_max_tokens(generation.max_tokens),
            );

        let memory = match self.memory {
            Some(memory) => memory,
            None => {
                let summarizer = invoker.clone().with_config(
                    LLMConfig::new()
                        .with_temperature(generation.summary_temperature)
                        .with_max_tokens(generation.max_tokens),
                );
                Arc::new(MemoryStore::from_config(&config.memory, Some(summarizer)))
            }
        };

        let records: Arc<dyn RecordStore> = self
            .records
            .unwrap_or_else(|| Arc::new(DirectoryRecordStore::new(config.records.data_dir.clone())));
        let parser = ResponseParser::new(config.parser.clone(), records.clone())?;

        Ok(Tutor {
            invoker,
            memory,
            parser,
            records,
            persona,
        })
    }
}

impl Default for TutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
