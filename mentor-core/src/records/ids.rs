use regex::Regex;

use crate::error::{MentorError, Result};

/// Assigns `PREFIX-NNN` identifiers by incrementing the largest one in use
#[derive(Debug, Clone)]
pub struct IdAllocator {
    prefix: String,
    min_width: usize,
    pattern: Regex,
}

impl IdAllocator {
    /// Create an allocator for `prefix` with at least three digits
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        let pattern = Regex::new(&format!(r"^{}-(\d{{3,}})$", regex::escape(&prefix)))
            .map_err(|e| MentorError::Configuration(format!("invalid id prefix: {}", e)))?;
        Ok(Self {
            prefix,
            min_width: 3,
            pattern,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `id` matches `PREFIX-\d{3,}`
    pub fn is_valid(&self, id: &str) -> bool {
        self.pattern.is_match(id)
    }

    /// Numeric suffix of a well-formed id
    pub fn suffix(&self, id: &str) -> Option<u64> {
        self.pattern
            .captures(id)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Next id after the maximum suffix among `existing`; ids that do not
    /// match the pattern are ignored
    pub fn next_id<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> String {
        let max = existing
            .into_iter()
            .filter_map(|id| self.suffix(id))
            .max()
            .unwrap_or(0);
        format!("{}-{:0width$}", self.prefix, max + 1, width = self.min_width)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            prefix: "CC".to_string(),
            min_width: 3,
            pattern: Regex::new(r"^CC-(\d{3,})$").expect("static pattern"),
        }
    }
}
