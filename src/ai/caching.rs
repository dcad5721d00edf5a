// src/ai/caching.rs
//! File cache + daily call budget around any [`CompletionClient`].
//!
//! Cache hits are served even when the budget is spent, so replaying a run
//! after a crash reuses earlier completions instead of paying for them twice.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{CompletionClient, CompletionRequest};
use crate::retry::CallError;
use crate::store::write_atomic;
use crate::text::sha256_hex;

pub struct CachingClient<C: CompletionClient> {
    inner: C,
    model: String,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    /// Loaded from disk on first use.
    counter: Mutex<Option<DailyCounter>>,
}

impl<C: CompletionClient> CachingClient<C> {
    pub fn new(inner: C, model: String, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        Self {
            inner,
            model,
            cache_dir,
            daily_limit_max,
            counter: Mutex::new(None),
        }
    }

    /// Real calls made today (cache hits excluded).
    pub async fn calls_today(&self) -> u32 {
        let mut g = self.counter.lock().await;
        let dc = self.loaded(&mut g).await;
        if dc.is_expired() {
            0
        } else {
            dc.count
        }
    }

    fn cache_key(&self, req: &CompletionRequest) -> String {
        sha256_hex(&format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.model,
            req.stage.as_str(),
            req.system,
            req.user
        ))
    }

    async fn loaded<'a>(&self, slot: &'a mut Option<DailyCounter>) -> &'a mut DailyCounter {
        if slot.is_none() {
            let dc = match load_daily_counter(&self.cache_dir).await {
                Ok(dc) => dc,
                Err(e) if e.kind() == io::ErrorKind::NotFound => DailyCounter::default(),
                Err(e) => {
                    tracing::warn!(target: "pipeline", error = %e, "daily AI counter unreadable; starting from zero");
                    DailyCounter::default()
                }
            };
            *slot = Some(dc);
        }
        slot.get_or_insert_with(DailyCounter::default)
    }

    async fn budget_left(&self) -> bool {
        let mut g = self.counter.lock().await;
        let dc = self.loaded(&mut g).await;
        if dc.is_expired() {
            dc.reset_to_today();
            let _ = save_daily_counter(&self.cache_dir, dc).await;
        }
        dc.count < self.daily_limit_max
    }

    async fn count_real_call(&self) {
        let mut g = self.counter.lock().await;
        let dc = self.loaded(&mut g).await;
        if dc.is_expired() {
            dc.reset_to_today();
        }
        dc.count = dc.count.saturating_add(1);
        if let Err(e) = save_daily_counter(&self.cache_dir, dc).await {
            tracing::warn!(target: "pipeline", error = %e, "cannot persist daily AI counter");
        }
    }
}

#[async_trait]
impl<C: CompletionClient> CompletionClient for CachingClient<C> {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, CallError> {
        let key = self.cache_key(req);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key).await {
            tracing::debug!(target: "pipeline", stage = %req.stage, "completion cache hit");
            return Ok(hit.completion);
        }

        if !self.budget_left().await {
            return Err(CallError::BudgetExhausted);
        }

        // Failed calls are not counted and not cached.
        let fresh = self.inner.complete(req).await?;
        self.count_real_call().await;
        let entry = CacheEntry {
            stage: req.stage.as_str().to_string(),
            completion: fresh,
        };
        if let Err(e) = write_cache_file(&self.cache_dir, &key, &entry).await {
            tracing::warn!(target: "pipeline", error = %e, "cannot write completion cache");
        }
        Ok(entry.completion)
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    stage: String,
    completion: String,
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

async fn read_cache_file(dir: &Path, key: &str) -> Option<CacheEntry> {
    let buf = tokio::fs::read_to_string(cache_path(dir, key)).await.ok()?;
    serde_json::from_str(&buf).ok()
}

async fn write_cache_file(dir: &Path, key: &str, value: &CacheEntry) -> io::Result<()> {
    let json = serde_json::to_vec(value)?;
    write_atomic(&cache_path(dir, key), &json).await
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join(COUNTER_FILE)
}

const COUNTER_FILE: &str = "daily_count.json";

async fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = tokio::fs::read_to_string(counter_path(dir)).await?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

async fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let s = serde_json::to_vec(dc)?;
    write_atomic(&counter_path(dir), &s).await
}
