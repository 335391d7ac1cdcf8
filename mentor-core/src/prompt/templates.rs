//! Prompt templates for each pipeline operation

use serde::{Deserialize, Serialize};

use super::composer::{ContextSection, compose};
use super::persona::Persona;
use crate::error::Result;
use crate::records::{Challenge, Submission, headings};

const NOTES_TITLE: &str = "Teacher's Notes";

/// What the student asked for in their next challenge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// Topics to focus on; empty lets the model choose from the notes
    pub topics: Vec<String>,
    /// Requested difficulty on the 1-10 scale
    pub difficulty: Option<u8>,
    /// Programming language the student works in
    pub language: Option<String>,
    /// Ask for a multiple-choice variant with answer options
    pub multiple_choice: bool,
}

impl ChallengeRequest {
    fn describe(&self) -> String {
        let mut lines = Vec::new();
        if !self.topics.is_empty() {
            lines.push(format!("Focus topics: {}", self.topics.join(", ")));
        }
        if let Some(difficulty) = self.difficulty {
            lines.push(format!("Requested difficulty: {}/10", difficulty));
        }
        if let Some(language) = &self.language {
            lines.push(format!("Language: {}", language));
        }
        if self.multiple_choice {
            lines.push("Format: multiple choice".to_string());
        }
        if lines.is_empty() {
            lines.push("No explicit preferences; choose based on the notes.".to_string());
        }
        lines.join("\n")
    }
}

fn notes_section(notes: &str) -> Option<ContextSection> {
    (!notes.trim().is_empty()).then(|| ContextSection::notes(NOTES_TITLE, notes))
}

/// Prompt asking for one new challenge in heading Markdown
pub fn challenge_prompt(
    persona: Option<&Persona>,
    request: &ChallengeRequest,
    notes: &str,
) -> Result<String> {
    let mut sections: Vec<ContextSection> = notes_section(notes).into_iter().collect();
    sections.push(ContextSection::plain("Student Preferences", request.describe()));

    let mut instructions = vec![
        "Write exactly one challenge the student can finish in under an hour.".to_string(),
        "Pitch the difficulty at the student's current level from the notes unless a difficulty was requested.".to_string(),
        "Avoid repeating challenges already mentioned in the notes.".to_string(),
        "Give concrete input/output examples.".to_string(),
    ];
    if request.multiple_choice {
        instructions.push(format!(
            "Add a '## {}' section with four answer options, exactly one of them correct.",
            headings::OPTIONS
        ));
    }

    let output_format = format!(
        "Markdown with these exact headings:\n\
         # <challenge title>\n\
         ## {description}\n\
         ## {requirements}\n(bullet list)\n\
         ## {examples}\n(bullet list)\n\
         ## {hints}\n(bullet list, optional)\n\
         ## {topics}\n(comma-separated list)\n\
         ## {difficulty}\n(a single number from 1 to 10)",
        description = headings::DESCRIPTION,
        requirements = headings::REQUIREMENTS,
        examples = headings::EXAMPLES,
        hints = headings::HINTS,
        topics = headings::TOPICS,
        difficulty = headings::DIFFICULTY,
    );

    compose(
        persona,
        "Create the student's next coding challenge.",
        &sections,
        &instructions,
        &output_format,
    )
}

/// Prompt asking for feedback on a submission
pub fn feedback_prompt(
    persona: Option<&Persona>,
    challenge: &Challenge,
    submission: &Submission,
    notes: &str,
) -> Result<String> {
    let mut sections = vec![
        ContextSection::plain("Challenge", challenge.to_markdown()),
        ContextSection::code(
            "Submission",
            submission.content.as_str(),
            submission.language.as_deref(),
        ),
    ];
    sections.extend(notes_section(notes));

    let instructions = [
        "Judge the submission against the challenge requirements.",
        "Name specific lines or constructs when pointing at strengths and weaknesses.",
        "Make every suggestion actionable.",
        "Relate the improvement path to patterns in the notes when there are any.",
    ]
    .map(String::from);

    let output_format = format!(
        "Markdown with these exact headings:\n\
         ## {strengths}\n(bullet list)\n\
         ## {weaknesses}\n(bullet list)\n\
         ## {suggestions}\n(bullet list)\n\
         ## {score}\n(a single number from 0 to 100)\n\
         ## {path}\n(one short paragraph)",
        strengths = headings::STRENGTHS,
        weaknesses = headings::WEAKNESSES,
        suggestions = headings::SUGGESTIONS,
        score = headings::SCORE,
        path = headings::IMPROVEMENT_PATH,
    );

    compose(
        persona,
        &format!("Review the student's submission for challenge {}.", challenge.id),
        &sections,
        &instructions,
        &output_format,
    )
}

/// Prompt asking for a reply to a student's letter plus insights about them
pub fn letter_prompt(persona: Option<&Persona>, letter: &str, notes: &str) -> Result<String> {
    let mut sections = vec![ContextSection::plain("Student Letter", letter)];
    sections.extend(notes_section(notes));

    let instructions = [
        "Answer every question the student asks.",
        "Keep the reply personal and under 300 words.",
        "Record what the letter reveals about the student in insights; omit keys you have no evidence for.",
        "Use skillLevelAdjustment only for a clear change in level, between -2 and 2.",
    ]
    .map(String::from);

    let output_format = "A single ```json fenced block containing:\n\
         {\"content\": \"<your reply>\", \"insights\": {\"strengths\": [], \"weaknesses\": [], \
         \"topics\": [], \"sentiment\": \"\", \"skillLevelAdjustment\": 0, \"flags\": []}}";

    compose(
        persona,
        "Reply to the student's letter.",
        &sections,
        &instructions,
        output_format,
    )
}

/// Prompt asking to condense notes into at most `target_chars` characters
pub fn summarization_prompt(text: &str, target_chars: usize) -> Result<String> {
    let sections = [ContextSection::notes("Notes", text)];
    let instructions = [
        format!("Keep the result under {} characters.", target_chars),
        "Preserve skill levels, recurring weaknesses, completed challenge ids and dates.".to_string(),
        "Merge repeated observations and drop small talk.".to_string(),
        "Do not invent anything that is not in the notes.".to_string(),
        "Do not use Markdown headings.".to_string(),
    ];

    compose(
        None,
        "Condense these teacher's notes about a student.",
        &sections,
        &instructions,
        "Plain sentences or bullet points only, with no preamble.",
    )
}
