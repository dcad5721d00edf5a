// tests/pipeline_scenarios.rs
// End-to-end passes over a temp queue with the scripted mock provider,
// a recording clock and a recording social platform.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde_json::{json, Value};

use newsroom_pipeline::ai::MockProvider;
use newsroom_pipeline::config::{PathSettings, RetrySettings};
use newsroom_pipeline::publish::sitemap::SITEMAP_FILE;
use newsroom_pipeline::queue::QueueEntry;
use newsroom_pipeline::retry::{CallError, RecordingClock};
use newsroom_pipeline::social::{Platform, RecordingPlatform};
use newsroom_pipeline::{
    run_candidate, run_pass, Candidate, CandidateStatus, Importance, PipelineConfig,
    PipelineContext, StageName,
};

struct Harness {
    ctx: Arc<PipelineContext>,
    mock: MockProvider,
    clock: RecordingClock,
    social: Arc<RecordingPlatform>,
}

fn config(root: &Path) -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.paths = PathSettings::under(root);
    cfg.site.base_url = Some("https://news.example".into());
    cfg.ai.provider = "mock".into();
    cfg.retry = RetrySettings {
        max_attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 40,
        attempt_timeout_ms: 5_000,
    };
    cfg
}

async fn harness(root: &Path, mock: &MockProvider, social: &Arc<RecordingPlatform>) -> Harness {
    let clock = RecordingClock::new();
    let platforms: Vec<Arc<dyn Platform>> = vec![social.clone()];
    let ctx = PipelineContext::with_parts(
        config(root),
        Arc::new(mock.clone()),
        Arc::new(clock.clone()),
        platforms,
    )
    .await
    .expect("context");
    Harness {
        ctx: Arc::new(ctx),
        mock: mock.clone(),
        clock,
        social: social.clone(),
    }
}

fn story(n: u32) -> Candidate {
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap() + ChronoDuration::minutes(n as i64);
    Candidate::new(
        format!("Lab releases open model number {n}"),
        format!("https://wire.example/story/{n}"),
        "<p>The lab published weights and a technical report.</p>",
        at,
    )
    .with_source("Wire")
}

async fn archived(h: &Harness, id: &str) -> Candidate {
    let raw = tokio::fs::read_to_string(h.ctx.queue.archive_path(id))
        .await
        .expect("archive file");
    serde_json::from_str(&raw).expect("archived candidate")
}

#[tokio::test]
async fn boring_story_is_rejected_without_index_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    mock.respond_with(
        StageName::Filter,
        json!({"importance": "Boring", "topic": "Software", "primary_keyword": "release", "reasoning": "Minor."})
            .to_string(),
    );
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;
    let c = story(1);
    h.ctx.queue.enqueue(&c).await.unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.rejected_by_reason.get("importance=Boring"), Some(&1));
    assert_eq!(summary.published, 0);
    assert!(h.ctx.gate.load_index().await.unwrap().articles.is_empty());
    assert_eq!(h.mock.calls(StageName::Outline), 0);
    assert!(h.ctx.store.exists(&c.id));

    let reasons = h.ctx.store.read_reasons().await.unwrap();
    assert_eq!(reasons.len(), 1);
    assert_eq!(reasons[0].outcome, "rejected");
    assert_eq!(reasons[0].reason.as_deref(), Some("importance=Boring"));

    let done = archived(&h, &c.id).await;
    assert_eq!(
        done.status,
        CandidateStatus::Rejected {
            reason: "importance=Boring".into()
        }
    );
    assert!(h.social.posted().is_empty());
}

#[tokio::test]
async fn empty_section_plan_is_repaired_and_published() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    mock.respond_with(
        StageName::Outline,
        json!({"h1": "Open model ships", "sections": []}).to_string(),
    );
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;
    let c = story(2);
    h.ctx.queue.enqueue(&c).await.unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();
    assert_eq!(summary.offered, 1);

    let done = archived(&h, &c.id).await;
    assert_eq!(done.status, CandidateStatus::Offered);
    let sections = done.results.get(StageName::Outline).unwrap()["sections"]
        .as_array()
        .unwrap()
        .clone();
    assert!(sections.len() >= 5, "got {} sections", sections.len());
    assert_eq!(sections.first().unwrap()["kind"], json!("introduction"));
    assert_eq!(sections.last().unwrap()["kind"], json!("conclusion"));
    let bodies = sections.iter().filter(|s| s["kind"] == json!("body")).count();
    assert_eq!(bodies, sections.len() - 2);

    let idx = h.ctx.gate.load_index().await.unwrap();
    assert_eq!(idx.articles.len(), 1);
    let entry = &idx.articles[0];
    assert_eq!(entry.id, c.id);
    assert!(entry.link.starts_with("articles/"));
    assert!(dir.path().join("site").join(&entry.link).exists());
    assert!(dir.path().join("site").join(SITEMAP_FILE).exists());
    assert_eq!(h.social.posted(), vec![c.id.clone()]);
}

#[tokio::test]
async fn same_identity_twice_in_one_pass_rejects_the_second_before_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;

    let first = story(3).with_external_id("feed-77");
    let mut second = Candidate::new(
        "A different headline for the same feed item",
        "https://mirror.example/77",
        "",
        first.discovered_at + ChronoDuration::minutes(5),
    )
    .with_external_id("feed-77");
    second.source = "Mirror".into();
    assert_eq!(first.id, second.id);

    // Same id, so write the producer files under distinct names.
    let queue_dir = dir.path().join("queue");
    std::fs::create_dir_all(&queue_dir).unwrap();
    std::fs::write(queue_dir.join("a.json"), serde_json::to_vec(&first).unwrap()).unwrap();
    std::fs::write(queue_dir.join("b.json"), serde_json::to_vec(&second).unwrap()).unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.offered, 1);
    assert_eq!(summary.rejected_by_reason.get("duplicate"), Some(&1));
    assert_eq!(h.mock.calls(StageName::Filter), 1);
    assert_eq!(h.ctx.gate.load_index().await.unwrap().articles.len(), 1);
    assert!(!queue_dir.join("a.json").exists());
    assert!(!queue_dir.join("b.json").exists());

    // The archive keeps the published candidate, not the duplicate.
    let done = archived(&h, &first.id).await;
    assert_eq!(done.status, CandidateStatus::Offered);
    assert_eq!(done.title, first.title);
}

#[tokio::test]
async fn same_title_and_image_under_new_link_is_a_content_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;

    let a = story(4).with_image("https://img.example/4.png");
    let mut b = Candidate::new(
        "  LAB releases open model number 4!  ",
        "https://other.example/4",
        "",
        a.discovered_at + ChronoDuration::minutes(1),
    )
    .with_image("https://img.example/4.png");
    b.source = "Other".into();
    assert_ne!(a.id, b.id);
    h.ctx.queue.enqueue(&a).await.unwrap();
    h.ctx.queue.enqueue(&b).await.unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();
    assert_eq!(summary.offered, 1);
    assert_eq!(summary.rejected_by_reason.get("duplicate"), Some(&1));
    // Different id: the duplicate gets its own terminal record.
    assert!(h.ctx.store.exists(&b.id));
    assert_eq!(
        archived(&h, &b.id).await.status,
        CandidateStatus::Rejected {
            reason: "duplicate".into()
        }
    );
}

#[tokio::test]
async fn second_run_over_the_same_candidates_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    let social = Arc::new(RecordingPlatform::new("recording"));
    let batch: Vec<Candidate> = (10..14).map(story).collect();

    let h = harness(dir.path(), &mock, &social).await;
    for c in &batch {
        h.ctx.queue.enqueue(c).await.unwrap();
    }
    let first = run_pass(h.ctx.clone()).await.unwrap();
    assert_eq!(first.offered, batch.len());
    let calls_after_first = mock.total_calls();
    let index_after_first = h.ctx.gate.load_index().await.unwrap();

    // Restart: fresh context over the same directories, producers re-send everything.
    let h2 = harness(dir.path(), &mock, &social).await;
    for c in &batch {
        h2.ctx.queue.enqueue(c).await.unwrap();
    }
    let second = run_pass(h2.ctx.clone()).await.unwrap();

    assert_eq!(second.offered, 0);
    assert_eq!(second.rejected_by_reason.get("duplicate"), Some(&batch.len()));
    assert_eq!(mock.total_calls(), calls_after_first);
    assert_eq!(social.posted().len(), batch.len());
    assert_eq!(h2.ctx.store.len(), batch.len());
    assert_eq!(h2.ctx.social.ledger().len().await, batch.len());
    let index_after_second = h2.ctx.gate.load_index().await.unwrap();
    assert_eq!(index_after_second.articles, index_after_first.articles);
    for c in &batch {
        assert_eq!(archived(&h2, &c.id).await.status, CandidateStatus::Offered);
    }
}

#[tokio::test]
async fn filter_exhaustion_fails_the_candidate_after_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    for _ in 0..3 {
        mock.push(StageName::Filter, Err(CallError::from_status(503, "busy")));
    }
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;
    let c = story(20);
    h.ctx.queue.enqueue(&c).await.unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();

    assert_eq!(summary.failed_by_stage.get("filter"), Some(&1));
    assert_eq!(h.mock.calls(StageName::Filter), 3);
    assert_eq!(
        h.clock.sleeps(),
        vec![Duration::from_millis(10), Duration::from_millis(20)]
    );
    let reasons = h.ctx.store.read_reasons().await.unwrap();
    assert_eq!(reasons[0].outcome, "failed");
    assert_eq!(reasons[0].stage, Some(StageName::Filter));
    assert!(matches!(
        archived(&h, &c.id).await.status,
        CandidateStatus::Failed { stage: StageName::Filter, .. }
    ));
}

#[tokio::test]
async fn non_retryable_error_fails_without_sleeping() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    mock.push(StageName::Filter, Err(CallError::from_status(401, "bad key")));
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;
    h.ctx.queue.enqueue(&story(21)).await.unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();
    assert_eq!(summary.failed_by_stage.get("filter"), Some(&1));
    assert_eq!(h.mock.calls(StageName::Filter), 1);
    assert!(h.clock.sleeps().is_empty());
}

#[tokio::test]
async fn outline_exhaustion_uses_the_synthesized_plan() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    for _ in 0..3 {
        mock.push(StageName::Outline, Err(CallError::Timeout(Duration::from_secs(5))));
    }
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;
    let c = story(22);
    h.ctx.queue.enqueue(&c).await.unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();
    assert_eq!(summary.offered, 1);
    let done = archived(&h, &c.id).await;
    let plan = done.results.get(StageName::Outline).unwrap();
    assert_eq!(plan["sections"][0]["kind"], json!("introduction"));
}

#[tokio::test]
async fn unusable_article_output_fails_the_article_stage() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    mock.respond_with(StageName::Article, "Sorry, I cannot write that article.");
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;
    let c = story(23);
    h.ctx.queue.enqueue(&c).await.unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();

    assert_eq!(summary.failed_by_stage.get("article"), Some(&1));
    assert!(h.ctx.gate.load_index().await.unwrap().articles.is_empty());
    assert_eq!(h.mock.calls(StageName::Tags), 0);
    let done = archived(&h, &c.id).await;
    // Earlier results stay with the archived candidate.
    assert!(done.results.contains(StageName::Outline));
    assert!(!done.results.contains(StageName::Article));
}

#[tokio::test]
async fn user_pick_override_beats_a_boring_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    mock.respond_with(
        StageName::Filter,
        json!({"importance": "Boring", "topic": "Hardware", "primary_keyword": "chips", "reasoning": "-"})
            .to_string(),
    );
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;
    let c = story(24)
        .with_importance_override(Importance::Breaking)
        .trending(true);
    h.ctx.queue.enqueue(&c).await.unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();
    assert_eq!(summary.offered, 1);
    let idx = h.ctx.gate.load_index().await.unwrap();
    assert!(idx.articles[0].is_breaking);
    assert_eq!(idx.articles[0].topic, "Hardware");
}

#[tokio::test]
async fn replayed_candidate_keeps_earlier_stage_results() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;

    let mut c = story(25);
    c.results
        .record(
            StageName::Filter,
            json!({"importance": "Interesting", "topic": "Research", "primary_keyword": "open model", "reasoning": "ok"}),
        )
        .unwrap();
    c.status = CandidateStatus::Running {
        stage: StageName::Outline,
    };
    h.ctx.queue.enqueue(&c).await.unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();
    assert_eq!(summary.offered, 1);
    assert_eq!(h.mock.calls(StageName::Filter), 0);
    assert_eq!(h.mock.calls(StageName::Outline), 1);
    let done = archived(&h, &c.id).await;
    assert_eq!(
        done.results.get(StageName::Filter).and_then(|v| v.get("topic")),
        Some(&Value::from("Research"))
    );
}

#[tokio::test]
async fn failing_platform_does_not_block_the_offer() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    let down = Arc::new(RecordingPlatform::failing("down"));
    let h = harness(dir.path(), &mock, &down).await;
    let c = story(26);
    h.ctx.queue.enqueue(&c).await.unwrap();

    let summary = run_pass(h.ctx.clone()).await.unwrap();
    assert_eq!(summary.offered, 1);
    assert_eq!(down.posted(), vec![c.id.clone()]);
    assert!(h.ctx.social.ledger().is_offered(&c.id).await);
}

#[tokio::test]
async fn single_candidate_can_be_driven_directly() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new();
    let h = harness(dir.path(), &mock, &Arc::new(RecordingPlatform::new("recording"))).await;
    let c = story(30);
    let path = h.ctx.queue.enqueue(&c).await.unwrap();

    let done = run_candidate(
        &h.ctx,
        QueueEntry {
            path: path.clone(),
            candidate: c.clone(),
        },
    )
    .await
    .unwrap();
    assert_eq!(done.status, CandidateStatus::Offered);
    assert!(!path.exists());

    let again = run_candidate(&h.ctx, QueueEntry { path, candidate: c }).await.unwrap();
    assert_eq!(
        again.status,
        CandidateStatus::Rejected {
            reason: "duplicate".into()
        }
    );
    assert_eq!(h.mock.calls(StageName::Filter), 1);
}
