//! Teacher's notes: a size-bounded, three-tier Markdown memory document
//!
//! The document holds a Current Snapshot of the student, a log of Recent
//! Activity and a condensed Long-Term History. Each section has a character
//! budget; overflowing sections are compacted by a [`CompactionPolicy`] that
//! summarizes through the LLM when it can and truncates when it cannot.

mod compaction;
mod document;
mod section;
mod store;

pub use compaction::{
    CompactionPolicy, SUMMARY_TARGET_RATIO, SummarizationError, TRUNCATION_MARKER,
    truncate_with_marker,
};
pub use document::{AIMemoryDocument, DOCUMENT_TITLE, LAST_UPDATED_PREFIX, SECTION_SEPARATOR};
pub use section::{MemorySection, SectionBudgets, SectionMode, char_len, keep_head, keep_tail};
pub use store::MemoryStore;
