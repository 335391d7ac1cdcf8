//! Prompt Composer
//!
//! Builds the prompt text sent to the model: an optional persona preamble, the
//! task, delimited context, numbered instructions and the expected output
//! format. Composition is pure; nothing here performs I/O.

mod composer;
mod persona;
mod templates;

pub use composer::{
    CONTEXT_BEGIN, CONTEXT_END, ContextSection, INSTRUCTIONS_BEGIN, INSTRUCTIONS_END, NOTES_BEGIN,
    NOTES_END, OUTPUT_FORMAT_BEGIN, OUTPUT_FORMAT_END, PromptContext, PromptContextBuilder,
    RenderHint, compose,
};
pub use persona::Persona;
pub use templates::{
    ChallengeRequest, challenge_prompt, feedback_prompt, letter_prompt, summarization_prompt,
};
