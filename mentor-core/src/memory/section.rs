//! Memory sections, mutation modes and character budgets

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::MemoryConfig;
use crate::error::MentorError;

/// The three tiers of the teacher's notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySection {
    /// Current picture of the student
    Snapshot,
    /// Latest events, newest appended last
    RecentActivity,
    /// Condensed long-term record
    History,
}

impl MemorySection {
    /// Document order
    pub const ALL: [MemorySection; 3] = [
        MemorySection::Snapshot,
        MemorySection::RecentActivity,
        MemorySection::History,
    ];

    /// Heading text as written in the document
    pub fn heading(&self) -> &'static str {
        match self {
            MemorySection::Snapshot => "Current Snapshot",
            MemorySection::RecentActivity => "Recent Activity",
            MemorySection::History => "Long-Term History & Patterns",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            MemorySection::Snapshot => "snapshot",
            MemorySection::RecentActivity => "recent_activity",
            MemorySection::History => "history",
        }
    }
}

impl std::fmt::Display for MemorySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for MemorySection {
    type Err = MentorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "snapshot" | "current_snapshot" => Ok(MemorySection::Snapshot),
            "recent_activity" | "recent" | "activity" => Ok(MemorySection::RecentActivity),
            "history" | "long_term_history" => Ok(MemorySection::History),
            other => Err(MentorError::Memory(format!("unknown memory section '{}'", other))),
        }
    }
}

/// How new content is combined with a section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionMode {
    /// Add after the existing content on a new line
    #[default]
    Append,
    /// Replace the existing content
    Overwrite,
}

impl SectionMode {
    /// Apply the mode to `current`
    pub fn combine(&self, current: &str, new: &str) -> String {
        let current = current.trim();
        let new = new.trim();
        match self {
            SectionMode::Overwrite => new.to_string(),
            SectionMode::Append if current.is_empty() => new.to_string(),
            SectionMode::Append if new.is_empty() => current.to_string(),
            SectionMode::Append => format!("{}\n{}", current, new),
        }
    }
}

impl FromStr for SectionMode {
    type Err = MentorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(SectionMode::Append),
            "overwrite" | "replace" => Ok(SectionMode::Overwrite),
            other => Err(MentorError::Memory(format!("unknown section mode '{}'", other))),
        }
    }
}

/// Character budget per section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBudgets {
    pub snapshot: usize,
    pub recent_activity: usize,
    pub history: usize,
}

impl SectionBudgets {
    pub fn budget(&self, section: MemorySection) -> usize {
        match section {
            MemorySection::Snapshot => self.snapshot,
            MemorySection::RecentActivity => self.recent_activity,
            MemorySection::History => self.history,
        }
    }
}

impl Default for SectionBudgets {
    fn default() -> Self {
        Self::from(&MemoryConfig::default())
    }
}

impl From<&MemoryConfig> for SectionBudgets {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            snapshot: config.snapshot_budget,
            recent_activity: config.recent_activity_budget,
            history: config.history_budget,
        }
    }
}

/// Length in characters, the unit of every budget
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The first `limit` characters
pub fn keep_head(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The last `limit` characters
pub fn keep_tail(text: &str, limit: usize) -> &str {
    let len = char_len(text);
    if len <= limit {
        return text;
    }
    match text.char_indices().nth(len - limit) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_parsing() {
        assert_eq!("recent-activity".parse::<MemorySection>().unwrap(), MemorySection::RecentActivity);
        assert_eq!("History".parse::<MemorySection>().unwrap(), MemorySection::History);
        assert!("notes".parse::<MemorySection>().is_err());
    }

    #[test]
    fn test_combine_modes() {
        assert_eq!(SectionMode::Append.combine("a", "b"), "a\nb");
        assert_eq!(SectionMode::Append.combine("  ", "b"), "b");
        assert_eq!(SectionMode::Overwrite.combine("a", "b"), "b");
    }

    #[test]
    fn test_default_budgets() {
        let budgets = SectionBudgets::default();
        assert_eq!(budgets.budget(MemorySection::Snapshot), 1_500);
        assert_eq!(budgets.budget(MemorySection::RecentActivity), 4_000);
        assert_eq!(budgets.budget(MemorySection::History), 8_000);
    }

    #[test]
    fn test_char_slicing_respects_multibyte() {
        let text = "héllo wörld";
        assert_eq!(keep_head(text, 2), "hé");
        assert_eq!(keep_tail(text, 5), "wörld");
        assert_eq!(keep_tail(text, 50), text);
        assert_eq!(keep_tail(text, 0), "");
    }
}
