//! The teacher's notes document and its Markdown form

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::LazyLock;

use super::section::{MemorySection, SectionBudgets};
use crate::error::{MentorError, Result};

pub const DOCUMENT_TITLE: &str = "# AI Teacher's Notes";
pub const LAST_UPDATED_PREFIX: &str = "Last Updated:";
pub const SECTION_SEPARATOR: &str = "---";

static BUDGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<!--\s*budget:.*-->$").expect("valid budget annotation regex")
});

/// Header plus the three note sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AIMemoryDocument {
    pub last_updated: DateTime<Utc>,
    snapshot: String,
    recent_activity: String,
    history: String,
}

impl AIMemoryDocument {
    /// Empty skeleton stamped with `now`
    pub fn skeleton(now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now,
            snapshot: String::new(),
            recent_activity: String::new(),
            history: String::new(),
        }
    }

    pub fn section(&self, section: MemorySection) -> &str {
        match section {
            MemorySection::Snapshot => &self.snapshot,
            MemorySection::RecentActivity => &self.recent_activity,
            MemorySection::History => &self.history,
        }
    }

    /// Replace a section's content.
    ///
    /// Content is trimmed, and lines that would read as one of the document's
    /// own headings are demoted to `###`.
    pub fn set_section(&mut self, section: MemorySection, content: &str) {
        let content = demote_headings(content.trim());
        match section {
            MemorySection::Snapshot => self.snapshot = content,
            MemorySection::RecentActivity => self.recent_activity = content,
            MemorySection::History => self.history = content,
        }
    }

    pub fn is_empty(&self) -> bool {
        MemorySection::ALL
            .iter()
            .all(|section| self.section(*section).is_empty())
    }

    /// Render as Markdown, annotating each heading with its budget
    pub fn render(&self, budgets: &SectionBudgets) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", DOCUMENT_TITLE);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} {}",
            LAST_UPDATED_PREFIX,
            self.last_updated.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        );

        for section in MemorySection::ALL {
            if section == MemorySection::History {
                let _ = writeln!(out, "\n{}", SECTION_SEPARATOR);
            }
            let _ = writeln!(out, "\n## {}", section.heading());
            let _ = writeln!(
                out,
                "<!-- budget: {} characters -->",
                budgets.budget(section)
            );
            let content = self.section(section);
            if !content.is_empty() {
                let _ = writeln!(out, "{}", content);
            }
        }
        out
    }

    /// Parse the Markdown form.
    ///
    /// Sections missing from the text are empty; a text containing none of the
    /// section headings is rejected rather than treated as blank notes.
    pub fn parse(text: &str) -> Result<Self> {
        let mut last_updated = None;
        let mut current: Option<MemorySection> = None;
        let mut bodies: [Vec<&str>; 3] = Default::default();
        let mut found_any = false;

        for line in text.lines() {
            let trimmed = line.trim_end();

            if let Some(section) = heading_of(trimmed) {
                current = Some(section);
                found_any = true;
                continue;
            }

            match current {
                None => {
                    if let Some(stamp) = trimmed.strip_prefix(LAST_UPDATED_PREFIX) {
                        last_updated = parse_timestamp(stamp.trim());
                    }
                }
                Some(section) => bodies[index(section)].push(line),
            }
        }

        if !found_any {
            return Err(MentorError::Memory(
                "document has no teacher's notes sections".to_string(),
            ));
        }

        let mut document = Self::skeleton(last_updated.unwrap_or_else(Utc::now));
        for section in MemorySection::ALL {
            let body = section_body(&bodies[index(section)], section);
            match section {
                MemorySection::Snapshot => document.snapshot = body,
                MemorySection::RecentActivity => document.recent_activity = body,
                MemorySection::History => document.history = body,
            }
        }
        Ok(document)
    }
}

fn index(section: MemorySection) -> usize {
    match section {
        MemorySection::Snapshot => 0,
        MemorySection::RecentActivity => 1,
        MemorySection::History => 2,
    }
}

fn heading_of(line: &str) -> Option<MemorySection> {
    let text = line.strip_prefix("## ")?.trim();
    MemorySection::ALL
        .into_iter()
        .find(|section| section.heading() == text)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(timestamp = raw, error = %e, "Unreadable Last Updated header");
            None
        }
    }
}

/// Section text without its budget annotation or the trailing separator
fn section_body(lines: &[&str], section: MemorySection) -> String {
    let mut lines: Vec<&str> = lines.to_vec();

    if let Some(first) = lines.iter().position(|l| !l.trim().is_empty()) {
        if BUDGET_RE.is_match(lines[first].trim()) {
            lines.remove(first);
        }
    }

    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if section == MemorySection::RecentActivity
        && lines.last().is_some_and(|l| l.trim() == SECTION_SEPARATOR)
    {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

fn demote_headings(content: &str) -> String {
    if !content.lines().any(|line| heading_of(line.trim_end()).is_some()) {
        return content.to_string();
    }
    content
        .lines()
        .map(|line| match heading_of(line.trim_end()) {
            Some(_) => format!("#{}", line),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_render_layout() {
        let mut doc = AIMemoryDocument::skeleton(stamp());
        doc.set_section(MemorySection::Snapshot, "Level: beginner");
        let text = doc.render(&SectionBudgets::default());

        assert!(text.starts_with("# AI Teacher's Notes\n\nLast Updated: 2024-03-01T12:30:00Z\n"));
        assert!(text.contains("## Current Snapshot\n<!-- budget: 1500 characters -->\nLevel: beginner\n"));
        assert!(text.contains("## Recent Activity\n<!-- budget: 4000 characters -->\n\n---\n\n## Long-Term History & Patterns\n"));
    }

    #[test]
    fn test_round_trip_preserves_sections() {
        let mut doc = AIMemoryDocument::skeleton(stamp());
        doc.set_section(MemorySection::Snapshot, "Level: intermediate\nPrefers Rust");
        doc.set_section(MemorySection::RecentActivity, "- 2024-03-01: CC-004 done\n\n- note");
        doc.set_section(MemorySection::History, "Struggled with lifetimes in February.");

        let text = doc.render(&SectionBudgets::default());
        let parsed = AIMemoryDocument::parse(&text).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(parsed.render(&SectionBudgets::default()), text);
    }

    #[test]
    fn test_round_trip_of_skeleton() {
        let doc = AIMemoryDocument::skeleton(stamp());
        let parsed = AIMemoryDocument::parse(&doc.render(&SectionBudgets::default())).unwrap();
        assert!(parsed.is_empty());
        assert_eq!(parsed.last_updated, stamp());
    }

    #[test]
    fn test_content_headings_are_demoted() {
        let mut doc = AIMemoryDocument::skeleton(stamp());
        doc.set_section(MemorySection::History, "## Recent Activity\nold stuff");
        assert_eq!(doc.section(MemorySection::History), "### Recent Activity\nold stuff");

        let parsed = AIMemoryDocument::parse(&doc.render(&SectionBudgets::default())).unwrap();
        assert!(parsed.section(MemorySection::RecentActivity).is_empty());
    }

    #[test]
    fn test_parse_tolerates_missing_sections_and_bad_stamp() {
        let text = "# AI Teacher's Notes\nLast Updated: yesterday\n\n## Recent Activity\nDid a thing\n";
        let doc = AIMemoryDocument::parse(text).unwrap();
        assert_eq!(doc.section(MemorySection::RecentActivity), "Did a thing");
        assert!(doc.section(MemorySection::Snapshot).is_empty());
    }

    #[test]
    fn test_parse_rejects_foreign_text() {
        let err = AIMemoryDocument::parse("# Shopping list\n- milk").unwrap_err();
        assert!(matches!(err, MentorError::Memory(_)));
    }
}
