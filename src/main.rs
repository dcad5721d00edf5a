//! newsroom-pipeline: one pass over the candidate queue, then exit.
//!
//! Exit code is 0 even when candidates were rejected or failed; non-zero on a
//! configuration error or a fail-closed state error.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsroom_pipeline::{run_pass, PipelineConfig, PipelineContext};

/// `RUST_LOG` wins; `LOG_FORMAT=json` switches to the JSON formatter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("newsroom_pipeline=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = PipelineConfig::load().context("loading pipeline config")?;
    let ctx = Arc::new(PipelineContext::from_config(config).await?);

    let outcome = run_pass(ctx.clone()).await;
    ctx.shutdown().await;

    let summary = outcome.context("pipeline pass aborted")?;
    println!("{summary}");
    Ok(())
}
