// src/driver.rs
//! Orchestrator: dedup, the fixed stage sequence, publish and social offer.
//!
//! One pass over the queue. Candidates run on a bounded pool of tokio tasks;
//! stages of one candidate run in order. Dedup decisions are made by the
//! dispatcher in queue order, so two candidates with the same identity in one
//! pass always resolve the same way.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::candidate::{Candidate, CandidateStatus, StageName};
use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::queue::QueueEntry;
use crate::retry;
use crate::schema::{repair, repair_value, RepairContext, RepairOutcome};
use crate::social::SocialPost;
use crate::stages::{Stage, Verdict};
use crate::store::{DedupVerdict, TerminalRecord};

pub const DUPLICATE_REASON: &str = "duplicate";

/// Why a stage could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: StageName,
    pub cause: String,
    pub retryable: bool,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.cause)
    }
}

/// Per-run counts printed by the binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub published: usize,
    pub offered: usize,
    pub rejected_by_reason: BTreeMap<String, usize>,
    pub failed_by_stage: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn record(&mut self, c: &Candidate) {
        self.processed += 1;
        match &c.status {
            CandidateStatus::Offered => {
                self.published += 1;
                self.offered += 1;
            }
            CandidateStatus::Published => self.published += 1,
            CandidateStatus::Rejected { reason } => {
                *self.rejected_by_reason.entry(reason.clone()).or_default() += 1;
            }
            CandidateStatus::Failed { stage, .. } => {
                *self
                    .failed_by_stage
                    .entry(stage.as_str().to_string())
                    .or_default() += 1;
            }
            CandidateStatus::New | CandidateStatus::Running { .. } => {}
        }
    }

    pub fn rejected(&self) -> usize {
        self.rejected_by_reason.values().sum()
    }

    pub fn failed(&self) -> usize {
        self.failed_by_stage.values().sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "processed: {}", self.processed)?;
        writeln!(f, "published: {}", self.published)?;
        writeln!(f, "offered:   {}", self.offered)?;
        writeln!(f, "rejected:  {}", self.rejected())?;
        for (reason, n) in &self.rejected_by_reason {
            writeln!(f, "  {reason}: {n}")?;
        }
        write!(f, "failed:    {}", self.failed())?;
        for (stage, n) in &self.failed_by_stage {
            write!(f, "\n  {stage}: {n}")?;
        }
        Ok(())
    }
}

/// One pass over the queue. Returns an error only for fail-closed conditions
/// (state store, site index, queue I/O); in-flight candidates are drained first.
pub async fn run_pass(ctx: Arc<PipelineContext>) -> Result<RunSummary, PipelineError> {
    let entries = ctx.queue.load().await.map_err(|source| PipelineError::Queue {
        path: ctx.queue.dir().to_path_buf(),
        source,
    })?;
    info!(
        target: "pipeline",
        pending = entries.len(),
        concurrency = ctx.concurrency(),
        "pass started"
    );

    let permits = Arc::new(Semaphore::new(ctx.concurrency()));
    let halt = Arc::new(AtomicBool::new(false));
    let mut tasks: JoinSet<Result<Option<Candidate>, PipelineError>> = JoinSet::new();
    let mut summary = RunSummary::default();
    let mut fatal: Option<PipelineError> = None;

    for mut entry in entries {
        while let Some(done) = tasks.try_join_next() {
            collect(done, &mut summary, &mut fatal);
        }
        if fatal.is_some() || halt.load(Ordering::SeqCst) {
            break;
        }

        match admit(&ctx, &mut entry).await {
            Ok(true) => {}
            Ok(false) => {
                summary.record(&entry.candidate);
                continue;
            }
            Err(e) => {
                fatal = Some(e);
                break;
            }
        }

        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let ctx = ctx.clone();
        let halt = halt.clone();
        tasks.spawn(async move {
            let _permit = permit;
            if halt.load(Ordering::SeqCst) {
                // Left pending; the next pass picks it up.
                return Ok(None);
            }
            let out = drive(&ctx, entry).await;
            if out.is_err() {
                halt.store(true, Ordering::SeqCst);
            }
            out.map(Some)
        });
    }

    while let Some(done) = tasks.join_next().await {
        collect(done, &mut summary, &mut fatal);
    }
    if let Some(e) = fatal {
        error!(target: "pipeline", error = %e, "pass aborted");
        return Err(e);
    }

    match ctx.gate.write_sitemap().await {
        Ok(Some(path)) => debug!(target: "publish", file = %path.display(), "sitemap written"),
        Ok(None) => {}
        Err(e) => warn!(target: "publish", error = %e, "sitemap not written"),
    }
    info!(
        target: "pipeline",
        processed = summary.processed,
        published = summary.published,
        offered = summary.offered,
        rejected = summary.rejected(),
        failed = summary.failed(),
        "pass finished"
    );
    Ok(summary)
}

/// Dedup then the full stage sequence for a single queued candidate.
pub async fn run_candidate(
    ctx: &PipelineContext,
    mut entry: QueueEntry,
) -> Result<Candidate, PipelineError> {
    if !admit(ctx, &mut entry).await? {
        return Ok(entry.candidate);
    }
    drive(ctx, entry).await
}

fn collect(
    done: Result<Result<Option<Candidate>, PipelineError>, JoinError>,
    summary: &mut RunSummary,
    fatal: &mut Option<PipelineError>,
) {
    match done {
        Ok(Ok(Some(c))) => summary.record(&c),
        Ok(Ok(None)) => {}
        Ok(Err(e)) => {
            if fatal.is_none() {
                *fatal = Some(e);
            } else {
                error!(target: "pipeline", error = %e, "additional fatal error");
            }
        }
        Err(e) => error!(target: "pipeline", error = %e, "candidate task panicked"),
    }
}

/// `New -> Rejected(duplicate)` or admitted. Duplicates are finalized here,
/// before any stage runs.
async fn admit(ctx: &PipelineContext, entry: &mut QueueEntry) -> Result<bool, PipelineError> {
    if entry.candidate.status.is_terminal() {
        finalize(ctx, &entry.path, &entry.candidate).await?;
        return Ok(false);
    }
    let verdict = ctx.dedup.check_and_accept(&entry.candidate);
    if verdict == DedupVerdict::Unique {
        return Ok(true);
    }
    info!(target: "pipeline", id = %entry.candidate.id, verdict = ?verdict, "duplicate rejected");
    entry.candidate.status = CandidateStatus::Rejected {
        reason: DUPLICATE_REASON.to_string(),
    };
    match verdict {
        // The id belongs to a processed or in-flight candidate; that one owns
        // the terminal record and the archive entry.
        DedupVerdict::DuplicateIdentity => {
            let record = TerminalRecord::from_candidate(&entry.candidate, Utc::now());
            ctx.store.log_reason(&record).await?;
            counter!("pipeline_candidates_total", "outcome" => entry.candidate.status.label())
                .increment(1);
            if let Err(e) = ctx.queue.discard(&entry.path).await {
                warn!(target: "pipeline", id = %entry.candidate.id, error = %e, "cannot remove duplicate");
            }
        }
        _ => finalize(ctx, &entry.path, &entry.candidate).await?,
    }
    Ok(false)
}

/// `Running(stage 1..n) -> Published -> Offered`, or an early terminal state.
async fn drive(ctx: &PipelineContext, mut entry: QueueEntry) -> Result<Candidate, PipelineError> {
    for stage in &ctx.stages {
        let name = stage.name();
        entry.candidate.status = CandidateStatus::Running { stage: name };

        // A replayed candidate keeps results from the earlier run.
        if !entry.candidate.results.contains(name) {
            match execute_stage(ctx, stage.as_ref(), &entry.candidate).await {
                Ok(value) => entry.candidate.results.record(name, value)?,
                Err(failure) => {
                    warn!(target: "pipeline", id = %entry.candidate.id, %failure, retryable = failure.retryable, "stage failed");
                    entry.candidate.status = CandidateStatus::Failed {
                        stage: name,
                        reason: failure.cause,
                    };
                    finalize(ctx, &entry.path, &entry.candidate).await?;
                    return Ok(entry.candidate);
                }
            }
        }

        let c = &entry.candidate;
        let verdict = c
            .results
            .get(name)
            .map(|v| stage.evaluate(c, v))
            .unwrap_or(Verdict::Continue);
        if let Verdict::Reject(reason) = verdict {
            info!(target: "pipeline", id = %c.id, stage = %name, %reason, "rejected");
            entry.candidate.status = CandidateStatus::Rejected { reason };
            finalize(ctx, &entry.path, &entry.candidate).await?;
            return Ok(entry.candidate);
        }

        if let Err(e) = ctx.queue.save_progress(&entry.path, &entry.candidate).await {
            warn!(target: "pipeline", id = %entry.candidate.id, error = %e, "cannot save progress");
        }
    }

    let article = ctx.gate.publish(&entry.candidate, Utc::now()).await?;
    entry.candidate.status = CandidateStatus::Published;

    let url = ctx
        .gate
        .absolute(&article.link)
        .unwrap_or_else(|| article.link.clone());
    ctx.social.offer(&SocialPost::from_summary(&article, url)).await?;
    entry.candidate.status = CandidateStatus::Offered;

    finalize(ctx, &entry.path, &entry.candidate).await?;
    Ok(entry.candidate)
}

/// Call the model with retries, then repair. Exhaustion falls back when the
/// stage has a fallback.
async fn execute_stage(
    ctx: &PipelineContext,
    stage: &dyn Stage,
    c: &Candidate,
) -> Result<Value, StageFailure> {
    let name = stage.name();
    let schema = stage.schema();
    let repair_ctx = RepairContext::for_candidate(c);
    let started = Instant::now();

    let req = stage.build_request(c);
    let req = &req;
    let client = &ctx.client;
    counter!("pipeline_stage_calls_total", "stage" => name.as_str()).increment(1);
    let attempt = retry::call(&ctx.retry, ctx.clock.as_ref(), name.as_str(), move |_| {
        client.complete(req)
    })
    .await;

    let out = match attempt {
        Ok(raw) => {
            let (value, outcome) = repair(&raw, schema, &repair_ctx);
            if outcome == RepairOutcome::TotalFailure && !stage.tolerates_synthesized() {
                Err(StageFailure {
                    stage: name,
                    cause: "unusable model output".to_string(),
                    retryable: false,
                })
            } else {
                Ok(value)
            }
        }
        Err(terminal) => match stage.fallback(c) {
            Some(fallback) => {
                info!(
                    target: "pipeline",
                    id = %c.id,
                    stage = %name,
                    attempts = terminal.attempts,
                    cause = terminal.cause.kind(),
                    "retries exhausted; using fallback"
                );
                Ok(repair_value(fallback, schema, &repair_ctx).0)
            }
            None => Err(StageFailure {
                stage: name,
                cause: terminal.to_string(),
                retryable: terminal.retryable(),
            }),
        },
    };

    let ms = started.elapsed().as_secs_f64() * 1000.0;
    histogram!("stage_duration_ms", "stage" => name.as_str()).record(ms);
    debug!(target: "pipeline", id = %c.id, stage = %name, ms, ok = out.is_ok(), "stage done");
    out
}

/// Durable terminal record, then archive. The record must succeed; the archive
/// is retried implicitly on the next pass (the id is already processed).
async fn finalize(ctx: &PipelineContext, path: &Path, c: &Candidate) -> Result<(), PipelineError> {
    let record = TerminalRecord::from_candidate(c, Utc::now());
    ctx.store.record_terminal(&record).await?;
    counter!("pipeline_candidates_total", "outcome" => c.status.label()).increment(1);
    if let Err(e) = ctx.queue.archive(path, c).await {
        warn!(target: "pipeline", id = %c.id, error = %e, "cannot archive candidate");
    }
    Ok(())
}
