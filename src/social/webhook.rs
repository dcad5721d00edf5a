// src/social/webhook.rs
//! Generic JSON webhook (automation hooks such as Make/Zapier) and the shared
//! retrying POST used by every webhook-style platform.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{Platform, SocialPost};
use crate::retry::{self, CallError, RetryPolicy, TokioClock};

/// Small, fast policy: social posts are best-effort.
pub(crate) fn webhook_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(4),
        attempt_timeout: Duration::from_secs(10),
    }
}

/// POST `body` as JSON, retrying transient failures.
pub(crate) async fn post_json<B: Serialize + Sync>(
    client: &Client,
    url: &str,
    body: &B,
    label: &'static str,
) -> anyhow::Result<()> {
    let policy = webhook_policy();
    retry::call(&policy, &TokioClock, label, move |_| async move {
        let rsp = client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;
        let status = rsp.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = rsp.text().await.unwrap_or_default();
            Err(CallError::from_status(status.as_u16(), text.chars().take(200).collect::<String>()))
        }
    })
    .await
    .map_err(|f| anyhow!("{label} webhook: {f}"))
}

pub struct WebhookPlatform {
    url: String,
    client: Client,
}

impl WebhookPlatform {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
        }
    }
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    event: &'static str,
    article: &'a SocialPost,
    text: String,
}

#[async_trait]
impl Platform for WebhookPlatform {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn post(&self, post: &SocialPost) -> anyhow::Result<()> {
        let body = WebhookBody {
            event: "article_published",
            article: post,
            text: short_text(post, 280),
        };
        post_json(&self.client, &self.url, &body, "webhook").await
    }
}

/// Title + hashtags + URL, trimmed so the whole line fits in `limit` chars.
pub fn short_text(post: &SocialPost, limit: usize) -> String {
    let prefix = if post.is_breaking { "BREAKING: " } else { "" };
    let tags = post.hashtags();
    let tail = if tags.is_empty() {
        format!(" {}", post.url)
    } else {
        format!(" {tags} {}", post.url)
    };
    let room = limit.saturating_sub(tail.chars().count() + prefix.len());
    let title = crate::text::one_line(&post.title, room);
    format!("{prefix}{title}{tail}")
}
