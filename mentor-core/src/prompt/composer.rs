//! Prompt composition
//!
//! A [`PromptContext`] is assembled once through [`PromptContextBuilder`] and
//! rendered into a single prompt string with a fixed layout:
//! persona preamble, task, CONTEXT, INSTRUCTIONS, OUTPUT FORMAT.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::persona::Persona;
use crate::error::{MentorError, Result};

pub const CONTEXT_BEGIN: &str = "=== CONTEXT ===";
pub const CONTEXT_END: &str = "=== END CONTEXT ===";
pub const INSTRUCTIONS_BEGIN: &str = "=== INSTRUCTIONS ===";
pub const INSTRUCTIONS_END: &str = "=== END INSTRUCTIONS ===";
pub const OUTPUT_FORMAT_BEGIN: &str = "=== OUTPUT FORMAT ===";
pub const OUTPUT_FORMAT_END: &str = "=== END OUTPUT FORMAT ===";
pub const NOTES_BEGIN: &str = "--- BEGIN NOTES ---";
pub const NOTES_END: &str = "--- END NOTES ---";

/// How a context section's content is wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderHint {
    /// Inserted verbatim
    Plain,
    /// Wrapped in BEGIN/END NOTES markers
    NotesBlock,
    /// Wrapped in a fenced code block
    CodeBlock,
}

/// One titled block of context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSection {
    pub title: String,
    pub content: String,
    pub render_hint: RenderHint,
    /// Info string for code blocks (e.g. "python")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ContextSection {
    pub fn plain(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            render_hint: RenderHint::Plain,
            language: None,
        }
    }

    pub fn notes(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            render_hint: RenderHint::NotesBlock,
            language: None,
        }
    }

    pub fn code(
        title: impl Into<String>,
        content: impl Into<String>,
        language: Option<impl Into<String>>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            render_hint: RenderHint::CodeBlock,
            language: language.map(Into::into),
        }
    }

    fn render(&self, out: &mut String) {
        let content = self.content.trim_end();
        let _ = writeln!(out, "### {}", self.title);
        match self.render_hint {
            RenderHint::Plain => {
                let _ = writeln!(out, "{}", content);
            }
            RenderHint::NotesBlock => {
                let _ = writeln!(out, "{}", NOTES_BEGIN);
                let _ = writeln!(out, "{}", content);
                let _ = writeln!(out, "{}", NOTES_END);
            }
            RenderHint::CodeBlock => {
                let fence = fence_for(content);
                let language = self.language.as_deref().unwrap_or_default();
                let _ = writeln!(out, "{}{}", fence, language);
                let _ = writeln!(out, "{}", content);
                let _ = writeln!(out, "{}", fence);
            }
        }
    }
}

/// A fence longer than any backtick run inside the content
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

/// Fully assembled prompt inputs. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    persona: Option<Persona>,
    task: String,
    sections: Vec<ContextSection>,
    instructions: Vec<String>,
    output_format: String,
}

impl PromptContext {
    /// Start building a prompt for `task`
    pub fn builder(task: impl Into<String>) -> PromptContextBuilder {
        PromptContextBuilder::new(task)
    }

    pub fn persona(&self) -> Option<&Persona> {
        self.persona.as_ref()
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn sections(&self) -> &[ContextSection] {
        &self.sections
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    pub fn output_format(&self) -> &str {
        &self.output_format
    }

    /// Render the prompt string
    pub fn compose(&self) -> String {
        let mut out = String::new();

        if let Some(persona) = &self.persona {
            let _ = writeln!(out, "{}", persona.preamble());
            out.push('\n');
        }

        let _ = writeln!(out, "TASK:\n{}", self.task.trim());
        out.push('\n');

        if !self.sections.is_empty() {
            let _ = writeln!(out, "{}", CONTEXT_BEGIN);
            for (i, section) in self.sections.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                section.render(&mut out);
            }
            let _ = writeln!(out, "{}", CONTEXT_END);
            out.push('\n');
        }

        let _ = writeln!(out, "{}", INSTRUCTIONS_BEGIN);
        for (i, instruction) in self.instructions.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, instruction.trim());
        }
        let _ = writeln!(out, "{}", INSTRUCTIONS_END);
        out.push('\n');

        let _ = writeln!(out, "{}", OUTPUT_FORMAT_BEGIN);
        let _ = writeln!(out, "{}", self.output_format.trim());
        let _ = write!(out, "{}", OUTPUT_FORMAT_END);

        out
    }
}

/// Builder for [`PromptContext`]
#[derive(Debug, Clone)]
pub struct PromptContextBuilder {
    persona: Option<Persona>,
    task: String,
    sections: Vec<ContextSection>,
    instructions: Vec<String>,
    output_format: String,
}

impl PromptContextBuilder {
    fn new(task: impl Into<String>) -> Self {
        Self {
            persona: None,
            task: task.into(),
            sections: Vec::new(),
            instructions: Vec::new(),
            output_format: String::new(),
        }
    }

    pub fn persona(mut self, persona: Option<Persona>) -> Self {
        self.persona = persona;
        self
    }

    pub fn section(mut self, section: ContextSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn sections(mut self, sections: impl IntoIterator<Item = ContextSection>) -> Self {
        self.sections.extend(sections);
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instructions.push(instruction.into());
        self
    }

    pub fn instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions.extend(instructions.into_iter().map(Into::into));
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    /// Finish the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`MentorError::InvalidPrompt`] when the task, the instructions or
    /// the output format are empty.
    pub fn build(self) -> Result<PromptContext> {
        if self.task.trim().is_empty() {
            return Err(MentorError::InvalidPrompt("task must not be empty".to_string()));
        }
        if self.instructions.iter().all(|i| i.trim().is_empty()) {
            return Err(MentorError::InvalidPrompt(
                "at least one instruction is required".to_string(),
            ));
        }
        if self.output_format.trim().is_empty() {
            return Err(MentorError::InvalidPrompt(
                "output format must not be empty".to_string(),
            ));
        }

        Ok(PromptContext {
            persona: self.persona,
            task: self.task,
            sections: self.sections,
            instructions: self
                .instructions
                .into_iter()
                .filter(|i| !i.trim().is_empty())
                .collect(),
            output_format: self.output_format,
        })
    }
}

/// Compose a prompt string in one call.
pub fn compose(
    persona: Option<&Persona>,
    task: &str,
    sections: &[ContextSection],
    instructions: &[String],
    output_format: &str,
) -> Result<String> {
    let context = PromptContext::builder(task)
        .persona(persona.cloned())
        .sections(sections.iter().cloned())
        .instructions(instructions.iter().cloned())
        .output_format(output_format)
        .build()?;
    Ok(context.compose())
}
