// src/social/slack.rs
use async_trait::async_trait;
use reqwest::Client;

use super::webhook::post_json;
use super::{Platform, SocialPost};

pub struct SlackPlatform {
    webhook_url: String,
    client: Client,
}

impl SlackPlatform {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
        }
    }
}

/// Slack mrkdwn for one post.
pub fn slack_text(post: &SocialPost) -> String {
    let marker = if post.is_breaking { ":rotating_light: " } else { "" };
    format!(
        "{marker}*<{}|{}>*\n{}\n_{}_",
        post.url,
        escape(&post.title),
        escape(&post.summary),
        escape(&post.topic)
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[async_trait]
impl Platform for SlackPlatform {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn post(&self, post: &SocialPost) -> anyhow::Result<()> {
        let body = serde_json::json!({ "text": slack_text(post) });
        post_json(&self.client, &self.webhook_url, &body, "slack").await
    }
}
