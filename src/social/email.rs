// src/social/email.rs
use anyhow::Context;
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Platform, SocialPost};
use crate::config::{ConfigError, EmailSettings};

pub struct EmailPlatform {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailPlatform {
    pub fn from_settings(s: &EmailSettings) -> Result<Self, ConfigError> {
        let creds = Credentials::new(s.username.clone(), s.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&s.smtp_host)
            .map_err(|e| ConfigError::Invalid(format!("social.email.smtp_host: {e}")))?
            .credentials(creds)
            .build();

        let from = s
            .from
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("social.email.from: {e}")))?;
        let to = s
            .to
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("social.email.to: {e}")))?;

        Ok(Self { mailer, from, to })
    }
}

pub fn email_subject(post: &SocialPost) -> String {
    if post.is_breaking {
        format!("[Breaking] {}", post.title)
    } else {
        format!("New article: {}", post.title)
    }
}

pub fn email_body(post: &SocialPost) -> String {
    format!(
        "{}\n\n{}\n\nTopic: {}\nTags: {}\nRead: {}\n",
        post.title,
        post.summary,
        post.topic,
        post.tags.join(", "),
        post.url
    )
}

#[async_trait]
impl Platform for EmailPlatform {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn post(&self, post: &SocialPost) -> anyhow::Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(email_subject(post))
            .header(header::ContentType::TEXT_PLAIN)
            .body(email_body(post))
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_flags_breaking() {
        let mut post = SocialPost {
            id: "1".into(),
            title: "Chip ban".into(),
            url: "u".into(),
            summary: "s".into(),
            topic: "Regulation".into(),
            tags: vec!["policy".into()],
            image_url: None,
            is_breaking: true,
        };
        assert_eq!(email_subject(&post), "[Breaking] Chip ban");
        post.is_breaking = false;
        assert_eq!(email_subject(&post), "New article: Chip ban");
        assert!(email_body(&post).contains("Tags: policy"));
    }
}
