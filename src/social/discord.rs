// src/social/discord.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::webhook::post_json;
use super::{Platform, SocialPost};

#[derive(Clone)]
pub struct DiscordPlatform {
    webhook: String,
    client: Client,
}

impl DiscordPlatform {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn post(&self, post: &SocialPost) -> anyhow::Result<()> {
        let title = if post.is_breaking {
            format!("Breaking: {}", post.title)
        } else {
            post.title.clone()
        };

        let tags_str: String = if post.tags.is_empty() {
            "-".to_string()
        } else {
            post.tags.join(" · ")
        };
        let description = format!(
            "{}\n\n**Topic:** {}\n**Tags:** {}",
            post.summary, post.topic, tags_str
        );

        let payload = DiscordWebhookPayload::embed(&title, &description, &post.url, post.image_url.as_deref());
        post_json(&self.client, &self.webhook, &payload, "discord").await
    }
}

#[derive(Serialize)]
struct DiscordImage {
    url: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<DiscordImage>,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn embed(title: &str, description: &str, url: &str, image: Option<&str>) -> Self {
        // Discord caps embed titles at 256 and descriptions at 4096 chars.
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: title.chars().take(256).collect(),
                description: description.chars().take(4096).collect(),
                url: url.to_string(),
                image: image.map(|u| DiscordImage { url: u.to_string() }),
            }],
        }
    }
}
