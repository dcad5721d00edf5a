// src/metrics.rs
//! Prometheus recorder for one-shot runs: the exposition is written to a
//! textfile at shutdown (node-exporter textfile collector style).

use std::io;
use std::path::{Path, PathBuf};

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::store::write_atomic;

/// One-time metrics registration (so series carry HELP text).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_candidates_total",
            "Candidates that reached a terminal state, by outcome."
        );
        describe_counter!(
            "pipeline_stage_calls_total",
            "Stage executions that called the AI provider."
        );
        describe_counter!(
            "schema_repairs_total",
            "Structured outputs passed through repair, by schema and outcome."
        );
        describe_counter!("retry_attempts_total", "External call attempts, by call.");
        describe_counter!("publish_total", "Index upserts by the publish gate.");
        describe_counter!(
            "social_offers_total",
            "Social platform deliveries, by platform and result."
        );
        describe_histogram!("stage_duration_ms", "Stage wall time in milliseconds.");
    });
}

pub struct Metrics {
    handle: PrometheusHandle,
    textfile: PathBuf,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if a recorder is already set.
    pub fn install(textfile: PathBuf) -> Result<Self, BuildError> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle, textfile })
    }

    pub fn textfile(&self) -> &Path {
        &self.textfile
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the current exposition to the textfile (atomic replace).
    pub async fn flush(&self) -> io::Result<()> {
        write_atomic(&self.textfile, self.render().as_bytes()).await
    }
}
