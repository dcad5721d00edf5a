// src/ai/mod.rs
//! AI completion clients: provider abstraction + file cache + daily budget.

pub mod caching;
pub mod mock;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::candidate::StageName;
use crate::config::{AiSettings, ConfigError};
use crate::retry::CallError;

pub use caching::CachingClient;
pub use mock::MockProvider;
pub use openai::OpenAiCompatProvider;

/// One chat-completion request issued by a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub stage: StageName,
    pub system: String,
    pub user: String,
}

/// Does one completion attempt. Retrying is the caller's job.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Raw model text (expected to contain a JSON object).
    async fn complete(&self, req: &CompletionRequest) -> Result<String, CallError>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynCompletionClient = Arc<dyn CompletionClient>;

/// Factory: build a client according to config.
///
/// * `provider = "mock"` (or `AI_TEST_MODE=mock`) → deterministic [`MockProvider`].
/// * otherwise → [`OpenAiCompatProvider`] wrapped with caching + daily budget.
pub fn build_client(settings: &AiSettings, cache_dir: &std::path::Path) -> Result<DynCompletionClient, ConfigError> {
    if settings.is_mock() {
        tracing::info!(target: "pipeline", "AI provider: mock");
        return Ok(Arc::new(MockProvider::new()));
    }
    let provider = OpenAiCompatProvider::from_settings(settings)
        .map_err(|e| ConfigError::Invalid(format!("building http client: {e}")))?;
    let client = CachingClient::new(
        provider,
        settings.model.clone(),
        cache_dir.to_path_buf(),
        settings.daily_limit,
    );
    tracing::info!(
        target: "pipeline",
        provider = %settings.provider,
        model = %settings.model,
        daily_limit = settings.daily_limit,
        "AI provider ready"
    );
    Ok(Arc::new(client))
}
