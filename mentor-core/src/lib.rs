//! # Mentor - LLM interaction and memory for an automated tutor
//!
//! Mentor asks a language model to generate coding challenges, review
//! submissions and answer student letters. This crate holds the core of that
//! pipeline:
//! - Prompt composition with personas and delimited context blocks
//! - Resilient LLM invocation with exponential backoff and jitter
//! - Parsing of semi-structured replies into validated records
//! - A size-bounded, three-tier "teacher's notes" memory document that
//!   compacts itself through summarization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mentor_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = MentorConfig::load()?;
//!     let tutor = Tutor::builder().config(config).build()?;
//!
//!     let challenge = tutor
//!         .generate_challenge(&ChallengeRequest::default())
//!         .await?;
//!     println!("{}", challenge.record.to_markdown());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The caller reads the [`memory::MemoryStore`] for context, the
//! [`prompt`] module builds the prompt, [`llm::ResilientInvoker`] calls the
//! provider, [`parsing::ResponseParser`] produces a validated
//! [`records::DomainRecord`], the record goes to a [`records::RecordStore`]
//! and a one-line event is appended to the notes, which may trigger
//! compaction.
//!
//! ## Feature Flags
//!
//! - `llm-openai`: OpenAI-compatible chat completions provider
//! - `llm-ollama`: Ollama provider

pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod parsing;
pub mod prompt;
pub mod records;
pub mod tutor;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{LLMProvider as LLMProviderType, LLMProviderConfig, MentorConfig};
    pub use crate::error::{MentorError, Result};
    pub use crate::llm::{
        LLMConfig, LLMProvider, LLMProviderFactory, ResilientInvoker, RetryPolicy, Sleeper,
    };
    pub use crate::memory::{
        AIMemoryDocument, CompactionPolicy, MemorySection, MemoryStore, SectionBudgets,
        SectionMode,
    };
    pub use crate::parsing::{ParseError, ParsedResponse, RecordSchema, ResponseParser};
    pub use crate::prompt::{ChallengeRequest, ContextSection, Persona, PromptContext, compose};
    pub use crate::records::{
        Challenge, DirectoryRecordStore, DomainRecord, Feedback, InMemoryRecordStore,
        LetterInsights, LetterResponse, RecordIndex, RecordKind, RecordStore, Submission,
    };
    pub use crate::tutor::{Generated, Tutor, TutorBuilder};
}
