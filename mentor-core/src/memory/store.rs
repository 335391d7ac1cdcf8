//! File-backed Memory Store

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::compaction::CompactionPolicy;
use super::document::AIMemoryDocument;
use super::section::{MemorySection, SectionBudgets, SectionMode, char_len, keep_head, keep_tail};
use crate::config::MemoryConfig;
use crate::error::{MentorError, Result};
use crate::llm::ResilientInvoker;

/// Reads and updates the teacher's notes document.
///
/// Every update is a read-modify-write of the whole file. Updates through one
/// store are serialized; across processes the last write wins.
pub struct MemoryStore {
    path: PathBuf,
    budgets: SectionBudgets,
    compaction: CompactionPolicy,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new(path: impl Into<PathBuf>, budgets: SectionBudgets, compaction: CompactionPolicy) -> Self {
        Self {
            path: path.into(),
            budgets,
            compaction,
            write_lock: Mutex::new(()),
        }
    }

    /// Store at the configured path; `invoker` enables AI summaries when the
    /// configuration allows them
    pub fn from_config(config: &MemoryConfig, invoker: Option<ResilientInvoker>) -> Self {
        Self::new(
            config.path.clone(),
            SectionBudgets::from(config),
            CompactionPolicy::from_config(invoker, &config.compaction),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn budgets(&self) -> &SectionBudgets {
        &self.budgets
    }

    pub fn compaction(&self) -> &CompactionPolicy {
        &self.compaction
    }

    /// Current document, creating the skeleton file when none exists
    pub async fn read(&self) -> Result<AIMemoryDocument> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => AIMemoryDocument::parse(&text).map_err(|e| {
                MentorError::Memory(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let document = AIMemoryDocument::skeleton(Utc::now());
                self.write(&document).await?;
                tracing::info!(path = %self.path.display(), "Created teacher's notes");
                Ok(document)
            }
            Err(e) => Err(MentorError::Memory(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Current content of one section
    pub async fn read_section(&self, section: MemorySection) -> Result<String> {
        Ok(self.read().await?.section(section).to_string())
    }

    /// The whole document rendered as Markdown, as handed to prompts
    pub async fn render(&self) -> Result<String> {
        Ok(self.read().await?.render(&self.budgets))
    }

    /// Apply `content` to `section` and enforce the section budgets.
    ///
    /// - Snapshot overflow keeps the head of the text.
    /// - Recent Activity overflow archives the previous activity into History
    ///   (condensed to half the History budget) and keeps only the new content.
    /// - History overflow is condensed to the History budget.
    ///
    /// Summarization problems never fail the update.
    pub async fn update(&self, section: MemorySection, content: &str, mode: SectionMode) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read().await?;

        match section {
            MemorySection::Snapshot => self.update_snapshot(&mut document, content, mode),
            MemorySection::RecentActivity => {
                self.update_recent_activity(&mut document, content, mode).await
            }
            MemorySection::History => {
                let combined = mode.combine(document.section(MemorySection::History), content);
                let compacted = self.compaction.compact(&combined, self.budgets.history).await;
                document.set_section(MemorySection::History, &compacted);
            }
        }

        tracing::debug!(section = %section, mode = ?mode, "Updated teacher's notes");
        self.write(&document).await
    }

    fn update_snapshot(&self, document: &mut AIMemoryDocument, content: &str, mode: SectionMode) {
        let combined = mode.combine(document.section(MemorySection::Snapshot), content);
        let budget = self.budgets.snapshot;
        if char_len(&combined) > budget {
            tracing::warn!(
                chars = char_len(&combined),
                budget,
                "Snapshot over budget, truncating"
            );
            document.set_section(MemorySection::Snapshot, keep_head(&combined, budget));
        } else {
            document.set_section(MemorySection::Snapshot, &combined);
        }
    }

    async fn update_recent_activity(
        &self,
        document: &mut AIMemoryDocument,
        content: &str,
        mode: SectionMode,
    ) {
        let previous = document.section(MemorySection::RecentActivity).to_string();
        let combined = mode.combine(&previous, content);
        let budget = self.budgets.recent_activity;
        if char_len(&combined) <= budget {
            document.set_section(MemorySection::RecentActivity, &combined);
            return;
        }

        // Overwrite discards the previous activity by request; only append archives it
        if mode == SectionMode::Append && !previous.is_empty() {
            let target = self.budgets.history / 2;
            let archived = self.compaction.condense(&previous, target).await;
            let history = document.section(MemorySection::History);
            let merged = if history.is_empty() {
                archived
            } else {
                format!("{}\n\n{}", archived, history)
            };
            let merged = self.compaction.compact(&merged, self.budgets.history).await;
            document.set_section(MemorySection::History, &merged);
            tracing::info!(
                archived_chars = char_len(&previous),
                history_chars = char_len(&merged),
                "Archived recent activity into history"
            );
        }

        let fresh = content.trim();
        if char_len(fresh) > budget {
            tracing::warn!(chars = char_len(fresh), budget, "New activity over budget, keeping tail");
            document.set_section(MemorySection::RecentActivity, keep_tail(fresh, budget));
        } else {
            document.set_section(MemorySection::RecentActivity, fresh);
        }
    }

    /// Empty one section
    pub async fn reset_section(&self, section: MemorySection) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read().await?;
        document.set_section(section, "");
        self.write(&document).await
    }

    /// Replace the whole document with the empty skeleton
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(&AIMemoryDocument::skeleton(Utc::now())).await
    }

    async fn write(&self, document: &AIMemoryDocument) -> Result<()> {
        let mut document = document.clone();
        document.last_updated = Utc::now();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, document.render(&self.budgets))
            .await
            .map_err(|e| MentorError::Memory(format!("failed to write {}: {}", self.path.display(), e)))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("path", &self.path)
            .field("budgets", &self.budgets)
            .field("ai_summaries", &self.compaction.uses_ai())
            .finish()
    }
}
