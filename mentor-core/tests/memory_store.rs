//! Teacher's notes persistence and compaction through the public API

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mentor_core::config::CompactionConfig;
use mentor_core::llm::{LLMRequest, LLMResponse};
use mentor_core::memory::TRUNCATION_MARKER;
use mentor_core::prelude::*;

struct Summarizer {
    reply: String,
    calls: AtomicUsize,
}

#[async_trait]
impl LLMProvider for Summarizer {
    async fn generate_request(&self, _request: &LLMRequest) -> Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LLMResponse {
            content: self.reply.clone(),
            usage: None,
        })
    }
}

fn budgets() -> SectionBudgets {
    SectionBudgets {
        snapshot: 100,
        recent_activity: 60,
        history: 200,
    }
}

#[tokio::test]
async fn test_hand_edited_notes_are_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.md");
    let text = "# AI Teacher's Notes\n\nLast Updated: 2026-01-05T09:00:00Z\n\n## Current Snapshot\nLevel 4, enjoys puzzles.\n\n## Recent Activity\n- 2026-01-04: Solved CC-003\n\n---\n\n## Long-Term History & Patterns\nStruggled with recursion early on.\n";
    tokio::fs::write(&path, text).await.unwrap();

    let store = MemoryStore::new(&path, budgets(), CompactionPolicy::truncating());
    store
        .update(MemorySection::RecentActivity, "- 2026-01-05: Started CC-004", SectionMode::Append)
        .await
        .unwrap();

    let document = store.read().await.unwrap();
    assert_eq!(document.section(MemorySection::Snapshot), "Level 4, enjoys puzzles.");
    assert_eq!(
        document.section(MemorySection::RecentActivity),
        "- 2026-01-04: Solved CC-003\n- 2026-01-05: Started CC-004"
    );
    assert_eq!(
        document.section(MemorySection::History),
        "Struggled with recursion early on."
    );

    let written = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(written.starts_with("# AI Teacher's Notes"));
    assert!(written.contains("<!-- budget: 60 characters -->"));
}

#[tokio::test]
async fn test_archived_activity_is_summarized() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(Summarizer {
        reply: "Worked through loops.".to_string(),
        calls: AtomicUsize::new(0),
    });
    let invoker = ResilientInvoker::new(provider.clone()).with_policy(RetryPolicy::no_retry());
    let store = MemoryStore::new(
        dir.path().join("notes.md"),
        budgets(),
        CompactionPolicy::summarizing(invoker, &CompactionConfig::default()),
    );

    store
        .update(MemorySection::RecentActivity, &"a".repeat(50), SectionMode::Append)
        .await
        .unwrap();
    store
        .update(MemorySection::RecentActivity, "- next event", SectionMode::Append)
        .await
        .unwrap();

    let document = store.read().await.unwrap();
    assert_eq!(document.section(MemorySection::RecentActivity), "- next event");
    assert_eq!(document.section(MemorySection::History), "Worked through loops.");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_history_never_exceeds_budget() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(dir.path().join("notes.md"), budgets(), CompactionPolicy::truncating());

    for i in 0..20 {
        store
            .update(MemorySection::History, &format!("pattern number {}", i), SectionMode::Append)
            .await
            .unwrap();
    }

    let history = store.read_section(MemorySection::History).await.unwrap();
    assert!(history.chars().count() <= 200);
    assert!(history.starts_with(TRUNCATION_MARKER.trim_end()));
    assert!(history.ends_with("pattern number 19"));
}

#[tokio::test]
async fn test_concurrent_appends_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new(
        dir.path().join("notes.md"),
        SectionBudgets::default(),
        CompactionPolicy::truncating(),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .update(MemorySection::RecentActivity, &format!("- event {}", i), SectionMode::Append)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let activity = store.read_section(MemorySection::RecentActivity).await.unwrap();
    assert_eq!(activity.lines().count(), 8);
    for i in 0..8 {
        assert!(activity.contains(&format!("- event {}", i)));
    }
}
