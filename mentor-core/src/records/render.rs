//! Output protocols consumed by downstream renderers (email templates, CLI)

use std::fmt::Write;

use super::headings;
use super::{Challenge, Feedback, LetterResponse};
use crate::error::Result;

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    let _ = writeln!(out, "\n## {}", heading);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

impl Challenge {
    /// Render as challenge Markdown (`# Title`, `## Description`, `## Topics`, ...)
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}", self.title);
        let _ = writeln!(out, "\n## {}\n{}", headings::DESCRIPTION, self.description.trim());

        if !self.requirements.is_empty() {
            push_list(&mut out, headings::REQUIREMENTS, &self.requirements);
        }
        if !self.examples.is_empty() {
            push_list(&mut out, headings::EXAMPLES, &self.examples);
        }
        if !self.hints.is_empty() {
            push_list(&mut out, headings::HINTS, &self.hints);
        }
        if !self.options.is_empty() {
            push_list(&mut out, headings::OPTIONS, &self.options);
        }

        let _ = writeln!(out, "\n## {}\n{}", headings::TOPICS, self.topics.join(", "));
        let _ = writeln!(out, "\n## {}\n{}", headings::DIFFICULTY, self.difficulty);
        out
    }
}

impl Feedback {
    /// Render as feedback Markdown
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Feedback for {}", self.submission_id);
        if let Some(score) = self.score {
            let _ = writeln!(out, "\n## {}\n{}", headings::SCORE, score);
        }
        push_list(&mut out, headings::STRENGTHS, &self.strengths);
        push_list(&mut out, headings::WEAKNESSES, &self.weaknesses);
        push_list(&mut out, headings::SUGGESTIONS, &self.suggestions);
        let _ = writeln!(
            out,
            "\n## {}\n{}",
            headings::IMPROVEMENT_PATH,
            self.improvement_path.trim()
        );
        out
    }
}

impl LetterResponse {
    /// Render as the `{content, insights}` JSON object
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::LetterInsights;
    use chrono::Utc;

    #[test]
    fn test_challenge_markdown_sections() {
        let challenge = Challenge {
            id: "CC-003".to_string(),
            title: "FizzBuzz".to_string(),
            description: "Print numbers.".to_string(),
            requirements: vec!["Use a loop".to_string()],
            examples: vec![],
            hints: vec!["Modulo helps".to_string()],
            options: vec![],
            difficulty: 2,
            topics: vec!["loops".to_string(), "conditionals".to_string()],
            created_at: Utc::now(),
        };
        let md = challenge.to_markdown();
        assert!(md.starts_with("# FizzBuzz\n"));
        assert!(md.contains("## Description\nPrint numbers."));
        assert!(md.contains("## Requirements\n- Use a loop"));
        assert!(md.contains("## Hints\n- Modulo helps"));
        assert!(!md.contains("## Examples"));
        assert!(md.contains("## Topics\nloops, conditionals"));
    }

    #[test]
    fn test_feedback_markdown_sections() {
        let feedback = Feedback {
            submission_id: "CC-003".to_string(),
            strengths: vec!["Readable".to_string()],
            weaknesses: vec!["No tests".to_string()],
            suggestions: vec!["Add tests".to_string()],
            score: None,
            improvement_path: "Learn pytest".to_string(),
            created_at: Utc::now(),
        };
        let md = feedback.to_markdown();
        assert!(md.contains("## Strengths\n- Readable"));
        assert!(md.contains("## Weaknesses\n- No tests"));
        assert!(md.contains("## Suggestions\n- Add tests"));
        assert!(md.contains("## Improvement Path\nLearn pytest"));
        assert!(!md.contains("## Score"));
    }

    #[test]
    fn test_letter_json_shape() {
        let letter = LetterResponse {
            content: "Keep going!".to_string(),
            insights: LetterInsights::default(),
        };
        let value: serde_json::Value = serde_json::from_str(&letter.to_json().unwrap()).unwrap();
        assert_eq!(value["content"], "Keep going!");
        assert!(value["insights"].as_object().unwrap().is_empty());
    }
}
