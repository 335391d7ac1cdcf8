//! End-to-end tests of the tutoring pipeline against a scripted provider

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use mentor_core::llm::{LLMRequest, LLMResponse, ModelInfo};
use mentor_core::prelude::*;

/// Replays canned outcomes in order and remembers every prompt
struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(MentorError::Provider("script exhausted".to_string())));
        next.map(|content| LLMResponse {
            content,
            usage: None,
        })
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: "scripted-1".to_string(),
        }
    }
}

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

struct Harness {
    tutor: Tutor,
    provider: Arc<ScriptedProvider>,
    records: Arc<InMemoryRecordStore>,
    sleeper: Arc<RecordingSleeper>,
    _dir: TempDir,
}

fn harness(script: Vec<Result<String>>, budgets: SectionBudgets) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(script);
    let records = Arc::new(InMemoryRecordStore::new());
    let sleeper = Arc::new(RecordingSleeper::default());
    let memory = Arc::new(MemoryStore::new(
        dir.path().join("notes.md"),
        budgets,
        CompactionPolicy::truncating(),
    ));

    let tutor = Tutor::builder()
        .llm_provider(provider.clone())
        .records(records.clone())
        .memory(memory)
        .sleeper(sleeper.clone())
        .build()
        .unwrap();

    Harness {
        tutor,
        provider,
        records,
        sleeper,
        _dir: dir,
    }
}

fn stored_challenge(id: &str) -> (String, DomainRecord) {
    (
        id.to_string(),
        DomainRecord::Challenge(Challenge {
            id: id.to_string(),
            title: "Earlier".to_string(),
            description: "An earlier exercise.".to_string(),
            requirements: vec![],
            examples: vec![],
            hints: vec![],
            options: vec![],
            difficulty: 3,
            topics: vec!["loops".to_string()],
            created_at: Utc::now(),
        }),
    )
}

const CHALLENGE_REPLY: &str = "# Two Sum\n\n## Description\nFind two numbers adding to a target.\n\n## Requirements\n- Run in O(n) time\n- Return the indices\n\n## Topics\narrays, hashing\n\n## Difficulty\n4\n";

const FEEDBACK_REPLY: &str = "## Strengths\n- Clear variable names\n\n## Weaknesses\n- Misses the empty input case\n\n## Suggestions\n- Add a guard clause\n\n## Score\n72/100\n";

fn transient(message: &str) -> Result<String> {
    Err(MentorError::Transient(message.to_string()))
}

#[tokio::test]
async fn test_challenge_gets_next_free_id_and_is_logged() {
    let h = harness(vec![Ok(CHALLENGE_REPLY.to_string())], SectionBudgets::default());
    h.records
        .seed([stored_challenge("CC-005"), stored_challenge("CC-007")])
        .await;

    let generated = h
        .tutor
        .generate_challenge(&ChallengeRequest {
            topics: vec!["arrays".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(generated.record.id, "CC-008");
    assert_eq!(generated.key, "CC-008");
    assert_eq!(generated.strategy, "heading");
    assert_eq!(generated.record.requirements.len(), 2);
    assert!(h.records.get(RecordKind::Challenge, "CC-008").await.is_some());

    let activity = h
        .tutor
        .memory()
        .read_section(MemorySection::RecentActivity)
        .await
        .unwrap();
    assert!(activity.contains("Assigned CC-008 \"Two Sum\""));

    let prompts = h.provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("arrays"));
    assert!(prompts[0].contains("Current Snapshot"));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let h = harness(
        vec![transient("429 Too Many Requests"), Ok(CHALLENGE_REPLY.to_string())],
        SectionBudgets::default(),
    );

    let generated = h
        .tutor
        .generate_challenge(&ChallengeRequest::default())
        .await
        .unwrap();

    assert_eq!(generated.record.id, "CC-001");
    assert_eq!(h.provider.prompts().len(), 2);
    assert_eq!(h.sleeper.delays.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_persist_nothing() {
    let h = harness(
        vec![transient("timeout"), transient("timeout"), transient("timeout")],
        SectionBudgets::default(),
    );

    let err = h
        .tutor
        .generate_challenge(&ChallengeRequest::default())
        .await
        .unwrap_err();

    match err {
        MentorError::InvocationExhausted {
            operation,
            attempts,
            ..
        } => {
            assert_eq!(operation, "generate_challenge");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(h.records.is_empty().await);
    assert_eq!(h.sleeper.delays.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_permanent_provider_error_is_not_retried() {
    let h = harness(
        vec![Err(MentorError::Provider("invalid api key".to_string()))],
        SectionBudgets::default(),
    );

    let err = h
        .tutor
        .generate_challenge(&ChallengeRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, MentorError::Provider(_)));
    assert_eq!(h.provider.prompts().len(), 1);
    assert!(h.sleeper.delays.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_reply_without_topics_is_rejected() {
    let h = harness(
        vec![Ok("# Two Sum\n\n## Description\nFind two numbers.\n".to_string())],
        SectionBudgets::default(),
    );

    let err = h
        .tutor
        .generate_challenge(&ChallengeRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, MentorError::Parse(ParseError::MissingEssential { .. })));
    assert!(err.to_string().contains("topics"));
    assert!(h.records.is_empty().await);

    let activity = h
        .tutor
        .memory()
        .read_section(MemorySection::RecentActivity)
        .await
        .unwrap();
    assert!(activity.is_empty());
}

#[tokio::test]
async fn test_feedback_is_keyed_by_submission() {
    let h = harness(vec![Ok(FEEDBACK_REPLY.to_string())], SectionBudgets::default());
    let (_, record) = stored_challenge("CC-003");
    let challenge = record.into_challenge().unwrap();
    let submission = Submission {
        challenge_id: "CC-003".to_string(),
        content: "def solve(xs): return xs[0]".to_string(),
        language: Some("python".to_string()),
    };

    let generated = h
        .tutor
        .generate_feedback(&challenge, &submission)
        .await
        .unwrap();

    assert_eq!(generated.key, "CC-003");
    assert_eq!(generated.record.submission_id, "CC-003");
    assert_eq!(generated.record.score, Some(72));
    assert!(h.records.get(RecordKind::Feedback, "CC-003").await.is_some());
    assert!(h.provider.prompts()[0].contains("def solve(xs)"));
}

#[tokio::test]
async fn test_feedback_for_other_challenge_is_refused() {
    let h = harness(vec![], SectionBudgets::default());
    let (_, record) = stored_challenge("CC-003");
    let challenge = record.into_challenge().unwrap();
    let submission = Submission {
        challenge_id: "CC-004".to_string(),
        content: "print(1)".to_string(),
        language: None,
    };

    let err = h
        .tutor
        .generate_feedback(&challenge, &submission)
        .await
        .unwrap_err();

    assert!(matches!(err, MentorError::InvalidPrompt(_)));
    assert!(h.provider.prompts().is_empty());
}

#[tokio::test]
async fn test_letter_insights_reach_the_notes() {
    let reply = r#"{"response": "Recursion gets easier with small examples.", "insights": {"topics": ["recursion"], "sentiment": "anxious", "skillLevelAdjustment": -1}}"#;
    let h = harness(vec![Ok(reply.to_string())], SectionBudgets::default());

    let generated = h
        .tutor
        .process_letter("I keep getting lost in recursive functions.")
        .await
        .unwrap();

    assert!(generated.key.starts_with("letter-"));
    assert_eq!(
        generated.record.content,
        "Recursion gets easier with small examples."
    );
    assert_eq!(generated.record.insights.skill_level_adjustment, Some(-1));

    let activity = h
        .tutor
        .memory()
        .read_section(MemorySection::RecentActivity)
        .await
        .unwrap();
    assert!(activity.contains("sentiment: anxious"));
    assert!(activity.contains("topics: recursion"));
}

#[tokio::test]
async fn test_activity_overflow_moves_into_history() {
    let budgets = SectionBudgets {
        snapshot: 200,
        recent_activity: 120,
        history: 400,
    };
    let h = harness(
        vec![
            Ok(CHALLENGE_REPLY.to_string()),
            Ok(CHALLENGE_REPLY.to_string()),
        ],
        budgets,
    );

    let first = h
        .tutor
        .generate_challenge(&ChallengeRequest::default())
        .await
        .unwrap();
    let second = h
        .tutor
        .generate_challenge(&ChallengeRequest::default())
        .await
        .unwrap();
    assert_eq!(first.record.id, "CC-001");
    assert_eq!(second.record.id, "CC-002");

    let document = h.tutor.memory().read().await.unwrap();
    let activity = document.section(MemorySection::RecentActivity);
    let history = document.section(MemorySection::History);

    assert!(activity.contains("CC-002"));
    assert!(!activity.contains("CC-001"));
    assert!(history.contains("CC-001"));
    assert!(activity.chars().count() <= 120);
    assert!(history.chars().count() <= 400);
}
