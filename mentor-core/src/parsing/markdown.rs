//! Markdown section parser and the heading extraction strategy

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::parser::{ExtractedFields, ExtractionStrategy, ParseError, ParseResult};
use crate::records::{RecordKind, headings};

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid heading regex"));

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+(.*)$").expect("valid bullet regex"));

/// A parsed markdown section
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownSection {
    /// Section heading
    pub heading: String,
    /// Heading level (1-6)
    pub level: usize,
    /// Section content
    pub content: String,
}

impl MarkdownSection {
    /// Whether the heading matches `name`, ignoring case and a trailing colon
    pub fn is_named(&self, name: &str) -> bool {
        normalize_heading(&self.heading).eq_ignore_ascii_case(name)
    }
}

fn normalize_heading(heading: &str) -> &str {
    heading.trim().trim_end_matches(':').trim_end()
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Markdown section parser
///
/// Splits markdown into sections at headings. Lines inside fenced code blocks
/// are never treated as headings.
#[derive(Debug, Clone)]
pub struct MarkdownParser {
    /// Minimum heading level to parse (1-6)
    min_level: usize,
    /// Maximum heading level to parse (1-6)
    max_level: usize,
}

impl MarkdownParser {
    /// Create a new markdown parser
    pub fn new() -> Self {
        Self {
            min_level: 1,
            max_level: 6,
        }
    }

    /// Only parse headings of specific levels
    pub fn with_levels(min: usize, max: usize) -> Self {
        Self {
            min_level: min.clamp(1, 6),
            max_level: max.clamp(1, 6),
        }
    }

    /// Parse into sections, in document order
    pub fn parse(&self, raw: &str) -> ParseResult<Vec<MarkdownSection>> {
        if raw.trim().is_empty() {
            return Err(ParseError::EmptyInput);
        }

        let mut sections = Vec::new();
        let mut current_heading: Option<(String, usize)> = None;
        let mut current_content = String::new();
        let mut in_fence = false;

        for line in raw.lines() {
            if is_fence(line) {
                in_fence = !in_fence;
            } else if !in_fence {
                if let Some(caps) = HEADING_RE.captures(line) {
                    let level = caps[1].len();
                    if level >= self.min_level && level <= self.max_level {
                        if let Some((prev_heading, prev_level)) = current_heading.take() {
                            sections.push(MarkdownSection {
                                heading: prev_heading,
                                level: prev_level,
                                content: current_content.trim().to_string(),
                            });
                            current_content.clear();
                        }

                        let heading = caps[2].trim().trim_end_matches('#').trim_end();
                        current_heading = Some((heading.to_string(), level));
                        continue;
                    }
                }
            }

            if current_heading.is_some() {
                if !current_content.is_empty() {
                    current_content.push('\n');
                }
                current_content.push_str(line);
            }
        }

        if let Some((heading, level)) = current_heading {
            sections.push(MarkdownSection {
                heading,
                level,
                content: current_content.trim().to_string(),
            });
        }

        if sections.is_empty() {
            return Err(ParseError::InvalidFormat(
                "No markdown sections found".to_string(),
            ));
        }

        Ok(sections)
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Items of a list section.
///
/// Bullet markers (`-`, `*`, `+`, `1.`) are stripped and following lines are
/// folded into the preceding item, fenced code included. A section without any
/// bullet yields its whole text as a single item.
pub fn list_items(content: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut in_fence = false;
    let mut saw_bullet = false;

    for line in content.lines() {
        let fence = is_fence(line);
        if !in_fence && !fence {
            if let Some(caps) = BULLET_RE.captures(line) {
                items.push(caps[1].trim().to_string());
                saw_bullet = true;
                continue;
            }
        }
        if fence {
            in_fence = !in_fence;
        }

        if let Some(last) = items.last_mut() {
            if fence || in_fence {
                last.push('\n');
                last.push_str(line.trim_end());
            } else if !line.trim().is_empty() {
                last.push('\n');
                last.push_str(line.trim());
            }
        }
    }

    if !saw_bullet {
        let text = content.trim();
        return if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Items of a field that may be written either as bullets or as one
/// comma-separated line. Fenced code is not an item.
pub fn comma_items(content: &str) -> Vec<String> {
    let mut in_fence = false;
    let content = content
        .lines()
        .filter(|line| {
            if is_fence(line) {
                in_fence = !in_fence;
                return false;
            }
            !in_fence
        })
        .collect::<Vec<_>>()
        .join("\n");

    if content.lines().any(|line| BULLET_RE.is_match(line)) {
        return list_items(&content);
    }
    content
        .split([',', ';', '\n'])
        .map(|item| item.trim().trim_matches('`').trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Body of a reply wrapped whole in a ```markdown fence
fn strip_outer_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return raw;
    };
    match body.split_once('\n') {
        Some((info, inner))
            if matches!(
                info.trim().to_ascii_lowercase().as_str(),
                "" | "markdown" | "md"
            ) =>
        {
            inner
        }
        _ => raw,
    }
}

fn strings(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}

/// Reads records written as `# Title` plus `## Section` blocks.
///
/// Section headings match the record's heading names without regard to case
/// or a trailing colon, so `## topics:` reads as `## Topics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingStrategy;

impl HeadingStrategy {
    fn find<'a>(sections: &'a [MarkdownSection], name: &str) -> Option<&'a MarkdownSection> {
        sections.iter().find(|s| s.level == 2 && s.is_named(name))
    }

    fn text(fields: &mut ExtractedFields, key: &str, sections: &[MarkdownSection], name: &str) {
        if let Some(section) = Self::find(sections, name) {
            fields.insert(key.to_string(), Value::String(section.content.clone()));
        }
    }

    fn list(fields: &mut ExtractedFields, key: &str, sections: &[MarkdownSection], name: &str) {
        if let Some(section) = Self::find(sections, name) {
            fields.insert(key.to_string(), strings(list_items(&section.content)));
        }
    }

    fn challenge(sections: &[MarkdownSection]) -> ExtractedFields {
        let mut fields = Map::new();
        let title_section = sections.iter().find(|s| s.level == 1);

        match title_section {
            Some(h1) => {
                fields.insert("title".to_string(), Value::String(h1.heading.clone()));
            }
            None => Self::text(&mut fields, "title", sections, "Title"),
        }

        Self::text(&mut fields, "description", sections, headings::DESCRIPTION);
        // Prose directly under the title stands in for a missing Description
        if !fields.contains_key("description") {
            if let Some(h1) = title_section.filter(|s| !s.content.is_empty()) {
                fields.insert("description".to_string(), Value::String(h1.content.clone()));
            }
        }

        Self::list(&mut fields, "requirements", sections, headings::REQUIREMENTS);
        Self::list(&mut fields, "examples", sections, headings::EXAMPLES);
        Self::list(&mut fields, "hints", sections, headings::HINTS);
        Self::list(&mut fields, "options", sections, headings::OPTIONS);
        if let Some(section) = Self::find(sections, headings::TOPICS) {
            fields.insert("topics".to_string(), strings(comma_items(&section.content)));
        }
        Self::text(&mut fields, "difficulty", sections, headings::DIFFICULTY);
        fields
    }

    fn feedback(sections: &[MarkdownSection]) -> ExtractedFields {
        let mut fields = Map::new();
        Self::list(&mut fields, "strengths", sections, headings::STRENGTHS);
        Self::list(&mut fields, "weaknesses", sections, headings::WEAKNESSES);
        Self::list(&mut fields, "suggestions", sections, headings::SUGGESTIONS);
        Self::text(&mut fields, "score", sections, headings::SCORE);
        Self::text(&mut fields, "improvementPath", sections, headings::IMPROVEMENT_PATH);
        fields
    }

    fn letter(sections: &[MarkdownSection]) -> ExtractedFields {
        let mut fields = Map::new();
        Self::text(&mut fields, "content", sections, headings::RESPONSE);

        let mut insights = Map::new();
        Self::list(&mut insights, "strengths", sections, headings::STRENGTHS);
        Self::list(&mut insights, "weaknesses", sections, headings::WEAKNESSES);
        if let Some(section) = Self::find(sections, headings::TOPICS) {
            insights.insert("topics".to_string(), strings(comma_items(&section.content)));
        }
        Self::list(&mut insights, "flags", sections, headings::FLAGS);
        Self::text(&mut insights, "sentiment", sections, headings::SENTIMENT);
        if !insights.is_empty() {
            fields.insert("insights".to_string(), Value::Object(insights));
        }
        fields
    }
}

impl ExtractionStrategy for HeadingStrategy {
    fn name(&self) -> &'static str {
        "heading"
    }

    fn extract(&self, raw: &str, kind: RecordKind) -> Option<ExtractedFields> {
        let sections = MarkdownParser::with_levels(1, 2)
            .parse(strip_outer_fence(raw))
            .ok()?;
        Some(match kind {
            RecordKind::Challenge => Self::challenge(&sections),
            RecordKind::Feedback => Self::feedback(&sections),
            RecordKind::LetterResponse => Self::letter(&sections),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_basic_sections() {
        let parser = MarkdownParser::new();
        let input = r#"# Heading 1
Content for heading 1

## Heading 2
Content for heading 2
More content"#;

        let sections = parser.parse(input).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].heading, "Heading 1");
        assert_eq!(sections[0].level, 1);
        assert!(sections[0].content.contains("Content for heading 1"));
        assert_eq!(sections[1].heading, "Heading 2");
        assert_eq!(sections[1].level, 2);
    }

    #[test]
    fn test_headings_inside_fences_are_content() {
        let parser = MarkdownParser::new();
        let input = "## Examples\n```python\n# not a heading\nprint(1)\n```\n## Topics\nloops";

        let sections = parser.parse(input).unwrap();
        assert_eq!(sections.len(), 2);
        assert!(sections[0].content.contains("# not a heading"));
        assert_eq!(sections[1].heading, "Topics");
    }

    #[test]
    fn test_section_names_ignore_case_and_colon() {
        let sections = MarkdownParser::new()
            .parse("# Answer:\n42\n\n# Explanation\nThe meaning of life")
            .unwrap();

        assert!(sections[0].is_named("answer"));
        assert_eq!(sections[0].content, "42");
        assert!(!sections[1].is_named("Answer"));
    }

    #[test]
    fn test_level_filter() {
        let parser = MarkdownParser::with_levels(2, 2);
        let input = "# Heading 1\nContent 1\n\n## Heading 2\nContent 2\n\n### Heading 3\nContent 3";

        let sections = parser.parse(input).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].heading, "Heading 2");
        assert!(sections[0].content.contains("### Heading 3"));
    }

    #[test]
    fn test_empty_and_headingless_input() {
        let parser = MarkdownParser::new();
        assert!(matches!(parser.parse(""), Err(ParseError::EmptyInput)));
        assert!(matches!(
            parser.parse("Just some text without headings"),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_list_items_strip_markers_and_fold_continuations() {
        let content = "- first\n* second\n  continued here\n+ third\n1. fourth";
        assert_eq!(
            list_items(content),
            vec!["first", "second\ncontinued here", "third", "fourth"]
        );
    }

    #[test]
    fn test_list_items_keep_fenced_code_with_item() {
        let content = "- Input: [1, 2]\n```\n- not a bullet\n```\n- Output: 3";
        let items = list_items(content);
        assert_eq!(items.len(), 2);
        assert!(items[0].contains("- not a bullet"));
    }

    #[test]
    fn test_list_items_without_bullets() {
        assert_eq!(list_items("Just one paragraph."), vec!["Just one paragraph."]);
        assert!(list_items("   ").is_empty());
    }

    #[test]
    fn test_comma_items() {
        assert_eq!(comma_items("loops, `recursion` , ,sorting"), vec!["loops", "recursion", "sorting"]);
        assert_eq!(comma_items("- a, b\n- c"), vec!["a, b", "c"]);
        assert_eq!(comma_items("graphs\n```json\n{\"x\": 1}\n```"), vec!["graphs"]);
        assert!(comma_items("```json\n{\"topics\": [\"a\"]}\n```").is_empty());
    }

    #[test]
    fn test_heading_strategy_challenge() {
        let raw = "# Reverse a String\n\n## Description\nWrite a function.\n\n## Requirements\n- No built-ins\n\n## Topics\nstrings, loops\n\n## Difficulty\n3/10";
        let fields = HeadingStrategy.extract(raw, RecordKind::Challenge).unwrap();

        assert_eq!(fields["title"], "Reverse a String");
        assert_eq!(fields["description"], "Write a function.");
        assert_eq!(fields["requirements"], json!(["No built-ins"]));
        assert_eq!(fields["topics"], json!(["strings", "loops"]));
        assert_eq!(fields["difficulty"], "3/10");
        assert!(!fields.contains_key("hints"));
    }

    #[test]
    fn test_heading_strategy_feedback() {
        let raw = "## Strengths\n- Clear names\n## Weaknesses\n- No tests\n## Suggestions\n- Add tests\n## Improvement Path\nStudy unit testing.";
        let fields = HeadingStrategy.extract(raw, RecordKind::Feedback).unwrap();

        assert_eq!(fields["strengths"], json!(["Clear names"]));
        assert_eq!(fields["improvementPath"], "Study unit testing.");
        assert!(!fields.contains_key("score"));
    }

    #[test]
    fn test_heading_strategy_letter_insights() {
        let raw = "## Response\nGreat question!\n\n## Topics\nclosures\n\n## Sentiment\npositive";
        let fields = HeadingStrategy.extract(raw, RecordKind::LetterResponse).unwrap();

        assert_eq!(fields["content"], "Great question!");
        assert_eq!(fields["insights"]["topics"], json!(["closures"]));
        assert_eq!(fields["insights"]["sentiment"], "positive");
    }

    #[test]
    fn test_heading_strategy_unwraps_markdown_fence() {
        let raw = "```markdown\n## Response\nHello!\n```";
        let fields = HeadingStrategy.extract(raw, RecordKind::LetterResponse).unwrap();
        assert_eq!(fields["content"], "Hello!");
    }

    #[test]
    fn test_heading_strategy_declines_plain_text() {
        assert!(HeadingStrategy.extract("{\"title\": \"x\"}", RecordKind::Challenge).is_none());
    }
}
