// src/context.rs
//! Everything a run needs, built once at startup and shared by all workers.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::ai::{build_client, DynCompletionClient};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::metrics::{ensure_metrics_described, Metrics};
use crate::publish::PublishGate;
use crate::queue::CandidateQueue;
use crate::retry::{Clock, RetryPolicy, TokioClock};
use crate::social::{build_platforms, Platform, SocialMux};
use crate::stages::{default_stages, Stage};
use crate::store::{DedupFilter, StateStore};

pub struct PipelineContext {
    pub config: PipelineConfig,
    pub client: DynCompletionClient,
    pub clock: Arc<dyn Clock>,
    pub retry: RetryPolicy,
    pub store: Arc<StateStore>,
    pub dedup: DedupFilter,
    pub gate: PublishGate,
    pub social: SocialMux,
    pub queue: CandidateQueue,
    pub stages: Vec<Box<dyn Stage>>,
    metrics: Option<Metrics>,
}

impl PipelineContext {
    /// Production wiring: provider, platforms and metrics from config.
    pub async fn from_config(config: PipelineConfig) -> anyhow::Result<Self> {
        let metrics = match &config.metrics.textfile {
            Some(p) => Some(Metrics::install(p.clone()).context("installing metrics recorder")?),
            None => None,
        };
        let client = build_client(&config.ai, &config.paths.cache_dir)?;
        let platforms = build_platforms(&config.social)?;
        let mut ctx = Self::with_parts(config, client, Arc::new(TokioClock), platforms)
            .await
            .context("opening pipeline state")?;
        ctx.metrics = metrics;
        Ok(ctx)
    }

    /// Explicit wiring (tests, embedding). Loads the processed index, the site
    /// index (dedup history) and the social ledger.
    pub async fn with_parts(
        config: PipelineConfig,
        client: DynCompletionClient,
        clock: Arc<dyn Clock>,
        platforms: Vec<Arc<dyn Platform>>,
    ) -> Result<Self, PipelineError> {
        ensure_metrics_described();
        let store = Arc::new(StateStore::open(&config.paths.state_dir).await?);
        let gate = PublishGate::new(
            config.paths.site_dir.clone(),
            config.site.base_url().map(str::to_string),
        );
        let index = gate.load_index().await?;
        let dedup = DedupFilter::new(store.clone(), index.content_history());
        let social = SocialMux::open(&config.paths.state_dir, config.social.daily_cap, platforms).await?;
        let queue = CandidateQueue::new(config.paths.queue_dir.clone());
        let retry = config.retry.policy();

        info!(
            target: "pipeline",
            provider = client.provider_name(),
            processed = store.len(),
            published = index.articles.len(),
            platforms = ?social.platform_names(),
            "pipeline context ready"
        );

        Ok(Self {
            config,
            client,
            clock,
            retry,
            store,
            dedup,
            gate,
            social,
            queue,
            stages: default_stages(),
            metrics: None,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.config.workers.concurrency.max(1)
    }

    /// Flush metrics. Safe to call more than once.
    pub async fn shutdown(&self) {
        if let Some(m) = &self.metrics {
            match m.flush().await {
                Ok(()) => info!(target: "pipeline", file = %m.textfile().display(), "metrics written"),
                Err(e) => warn!(target: "pipeline", error = %e, "cannot write metrics textfile"),
            }
        }
    }
}
