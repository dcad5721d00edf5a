// tests/metrics.rs
// Installs the global Prometheus recorder, so this file holds a single test
// (each tests/*.rs is its own process).

use std::sync::Arc;

use chrono::Utc;

use newsroom_pipeline::config::PathSettings;
use newsroom_pipeline::{run_pass, Candidate, PipelineConfig, PipelineContext};

#[tokio::test]
async fn textfile_contains_pipeline_series_after_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let textfile = dir.path().join("metrics").join("newsroom.prom");

    let mut cfg = PipelineConfig::default();
    cfg.paths = PathSettings::under(dir.path());
    cfg.ai.provider = "mock".into();
    cfg.metrics.textfile = Some(textfile.clone());

    let ctx = Arc::new(PipelineContext::from_config(cfg).await.unwrap());
    let c = Candidate::new(
        "Robotics startup raises a new round",
        "https://wire.example/robots",
        "Funding news.",
        Utc::now(),
    );
    ctx.queue.enqueue(&c).await.unwrap();

    let summary = run_pass(ctx.clone()).await.unwrap();
    assert_eq!(summary.offered, 1);
    ctx.shutdown().await;

    let text = std::fs::read_to_string(&textfile).unwrap();
    for needle in [
        "pipeline_candidates_total",
        "pipeline_stage_calls_total",
        "schema_repairs_total",
        "retry_attempts_total",
        "publish_total",
        "stage_duration_ms",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
    assert!(text.contains(r#"outcome="offered""#), "{text}");
}
