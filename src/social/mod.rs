// src/social/mod.rs
//! Offering published articles to social integrations, at most once.
//!
//! The ledger claim is persisted *before* any platform is called. A crash after
//! the claim loses that offer instead of repeating it.

pub mod daily;
pub mod discord;
pub mod email;
pub mod ledger;
pub mod slack;
pub mod webhook;

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use daily::DailyCaps;
pub use ledger::SocialLedger;

use crate::config::{ConfigError, SocialSettings};
use crate::publish::PublishedArticleSummary;
use crate::store::StoreError;

/// What a platform receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocialPost {
    pub id: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub topic: String,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub is_breaking: bool,
}

impl SocialPost {
    pub fn from_summary(s: &PublishedArticleSummary, url: String) -> Self {
        Self {
            id: s.id.clone(),
            title: s.title.clone(),
            url,
            summary: s.summary_short.clone(),
            topic: s.topic.clone(),
            tags: s.tags.clone(),
            image_url: s.image_url.clone(),
            is_breaking: s.is_breaking,
        }
    }

    /// Hashtags from tags: alphanumerics only, max 3.
    pub fn hashtags(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
            .filter(|t| !t.is_empty())
            .take(3)
            .map(|t| format!("#{t}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
pub trait Platform: Send + Sync {
    fn name(&self) -> &'static str;
    async fn post(&self, post: &SocialPost) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OfferReport {
    pub delivered: usize,
    pub failed: usize,
    pub capped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// Claimed now; platforms were invoked.
    Offered(OfferReport),
    /// Claimed by an earlier run; nothing was sent.
    AlreadyOffered,
}

pub struct SocialMux {
    platforms: Vec<Arc<dyn Platform>>,
    ledger: SocialLedger,
    caps: DailyCaps,
}

impl SocialMux {
    pub async fn open(
        state_dir: &Path,
        daily_cap: u32,
        platforms: Vec<Arc<dyn Platform>>,
    ) -> Result<Self, StoreError> {
        let ledger = SocialLedger::open(state_dir).await?;
        let caps = DailyCaps::open(state_dir, daily_cap).await;
        Ok(Self {
            platforms,
            ledger,
            caps,
        })
    }

    pub fn platform_names(&self) -> Vec<&'static str> {
        self.platforms.iter().map(|p| p.name()).collect()
    }

    pub fn ledger(&self) -> &SocialLedger {
        &self.ledger
    }

    /// `NotOffered → Offered`, once per id. Platform failures are logged and
    /// counted, never returned; only a ledger write failure is an error.
    pub async fn offer(&self, post: &SocialPost) -> Result<OfferOutcome, StoreError> {
        if !self.ledger.claim(&post.id).await? {
            debug!(target: "social", id = %post.id, "already offered; skipping");
            return Ok(OfferOutcome::AlreadyOffered);
        }

        let mut report = OfferReport::default();
        for p in &self.platforms {
            let name = p.name();
            if !self.caps.try_take(name).await {
                info!(target: "social", platform = name, id = %post.id, "daily cap reached; skipped");
                counter!("social_offers_total", "platform" => name, "result" => "capped").increment(1);
                report.capped += 1;
                continue;
            }
            match p.post(post).await {
                Ok(()) => {
                    counter!("social_offers_total", "platform" => name, "result" => "ok").increment(1);
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(target: "social", platform = name, id = %post.id, error = %e, "post failed");
                    counter!("social_offers_total", "platform" => name, "result" => "error").increment(1);
                    report.failed += 1;
                }
            }
        }
        info!(
            target: "social",
            id = %post.id,
            delivered = report.delivered,
            failed = report.failed,
            capped = report.capped,
            "offered"
        );
        Ok(OfferOutcome::Offered(report))
    }
}

/// Build every platform that has configuration. Missing sections disable a platform.
pub fn build_platforms(settings: &SocialSettings) -> Result<Vec<Arc<dyn Platform>>, ConfigError> {
    let mut out: Vec<Arc<dyn Platform>> = Vec::new();
    if let Some(w) = &settings.webhook {
        out.push(Arc::new(webhook::WebhookPlatform::new(w.url.clone())));
    }
    if let Some(d) = &settings.discord {
        out.push(Arc::new(discord::DiscordPlatform::new(d.url.clone())));
    }
    if let Some(s) = &settings.slack {
        out.push(Arc::new(slack::SlackPlatform::new(s.url.clone())));
    }
    if let Some(e) = &settings.email {
        out.push(Arc::new(email::EmailPlatform::from_settings(e)?));
    }
    Ok(out)
}

/// Test/demo platform that records post ids and optionally fails.
pub struct RecordingPlatform {
    name: &'static str,
    fail: bool,
    pub posts: Mutex<Vec<String>>,
}

impl RecordingPlatform {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fail: false,
            posts: Mutex::new(vec![]),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn posted(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn post(&self, post: &SocialPost) -> anyhow::Result<()> {
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(post.id.clone());
        if self.fail {
            anyhow::bail!("{} is down", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str) -> SocialPost {
        SocialPost {
            id: id.into(),
            title: "T".into(),
            url: "https://n.example/articles/t.html".into(),
            summary: "S".into(),
            topic: "Other".into(),
            tags: vec!["Open Source".into(), "AI".into()],
            image_url: None,
            is_breaking: false,
        }
    }

    #[tokio::test]
    async fn failure_on_one_platform_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let ok = Arc::new(RecordingPlatform::new("ok"));
        let bad = Arc::new(RecordingPlatform::failing("bad"));
        let mux = SocialMux::open(dir.path(), 10, vec![bad.clone(), ok.clone()])
            .await
            .unwrap();

        let out = mux.offer(&post("p1")).await.unwrap();
        assert_eq!(
            out,
            OfferOutcome::Offered(OfferReport {
                delivered: 1,
                failed: 1,
                capped: 0
            })
        );
        assert_eq!(ok.posted(), vec!["p1".to_string()]);
        assert_eq!(mux.offer(&post("p1")).await.unwrap(), OfferOutcome::AlreadyOffered);
        assert_eq!(ok.posted().len(), 1);
    }

    #[tokio::test]
    async fn ledger_claim_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let p = Arc::new(RecordingPlatform::new("p"));
        {
            let mux = SocialMux::open(dir.path(), 10, vec![p.clone()]).await.unwrap();
            mux.offer(&post("x")).await.unwrap();
        }
        let mux = SocialMux::open(dir.path(), 10, vec![p.clone()]).await.unwrap();
        assert_eq!(mux.offer(&post("x")).await.unwrap(), OfferOutcome::AlreadyOffered);
        assert_eq!(p.posted().len(), 1);
    }

    #[tokio::test]
    async fn daily_cap_skips_platform() {
        let dir = tempfile::tempdir().unwrap();
        let p = Arc::new(RecordingPlatform::new("p"));
        let mux = SocialMux::open(dir.path(), 1, vec![p.clone()]).await.unwrap();
        mux.offer(&post("a")).await.unwrap();
        let out = mux.offer(&post("b")).await.unwrap();
        assert_eq!(
            out,
            OfferOutcome::Offered(OfferReport {
                delivered: 0,
                failed: 0,
                capped: 1
            })
        );
        assert_eq!(p.posted(), vec!["a".to_string()]);
        assert!(mux.ledger().is_offered("b").await);
    }

    #[test]
    fn hashtags_are_compacted() {
        assert_eq!(post("h").hashtags(), "#OpenSource #AI");
    }
}
