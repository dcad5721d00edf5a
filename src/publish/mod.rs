// src/publish/mod.rs
//! Publish gate: commits a finished candidate to the site exactly once.
//!
//! Order of effects: artifact page first, then one serialized read-modify-write
//! of the site index. Pages embed the candidate id, so a crash between the two
//! writes is recognised on replay and the same slug is reused.

pub mod index;
pub mod render;
pub mod sitemap;

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::Value;
use tracing::info;

pub use index::{trend_score, PublishedArticleSummary, SiteIndex, INDEX_FILE};

use crate::candidate::{Candidate, Importance, StageName};
use crate::store::write_atomic;
use crate::text::{one_line, slugify};

pub const ARTICLES_DIR: &str = "articles";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("io on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt site file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("candidate {id} has no `{stage}` result")]
    Incomplete { id: String, stage: StageName },
}

pub struct PublishGate {
    site_dir: PathBuf,
    base_url: Option<String>,
    lock: tokio::sync::Mutex<()>,
}

impl PublishGate {
    pub fn new(site_dir: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            site_dir: site_dir.into(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.site_dir.join(INDEX_FILE)
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Absolute URL of a site-relative link when a base URL is configured.
    pub fn absolute(&self, link: &str) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|b| format!("{b}/{}", link.trim_start_matches('/')))
    }

    pub async fn load_index(&self) -> Result<SiteIndex, PublishError> {
        SiteIndex::load(&self.index_path()).await
    }

    /// Write the page and upsert the index entry. Idempotent per candidate id:
    /// same slug, one index entry, original `published_at` kept.
    pub async fn publish(
        &self,
        c: &Candidate,
        now: DateTime<Utc>,
    ) -> Result<PublishedArticleSummary, PublishError> {
        let article = required(c, StageName::Article)?;
        let tags: Vec<String> = c
            .results
            .get(StageName::Tags)
            .and_then(|v| v.get("tags"))
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let h1 = c
            .results
            .get(StageName::Outline)
            .and_then(|v| str_of(v, "h1"))
            .unwrap_or(c.title.trim());
        let title_tag = str_of(article, "title_tag").unwrap_or(c.title.trim());
        let meta = str_of(article, "meta_description").unwrap_or_default();
        let body_md = str_of(article, "body_md").unwrap_or_default();

        let _guard = self.lock.lock().await;
        let index_path = self.index_path();
        let mut idx = SiteIndex::load(&index_path).await?;
        let previous = idx.get(&c.id).cloned();

        let slug = self.resolve_slug(c, &idx).await?;
        let link = format!("{ARTICLES_DIR}/{slug}.html");
        let published_at = previous.as_ref().map(|p| p.published_at).unwrap_or(now);
        let canonical = self.absolute(&link);

        let page = render::render_page(&render::PageInput {
            id: &c.id,
            title_tag,
            meta_description: meta,
            h1,
            body_md,
            tags: &tags,
            source_link: &c.link,
            canonical_url: canonical.as_deref(),
            image_url: c.image_url.as_deref(),
            published_at,
        });
        let page_path = self.article_path(&slug);
        write_atomic(&page_path, page.as_bytes())
            .await
            .map_err(|source| PublishError::Io {
                path: page_path.clone(),
                source,
            })?;

        let importance = c.importance();
        let summary_src = if meta.is_empty() { c.summary(400) } else { meta.to_string() };
        let entry = PublishedArticleSummary {
            id: c.id.clone(),
            title: c.title.trim().to_string(),
            link,
            published_at,
            summary_short: one_line(&summary_src, 200),
            image_url: c.image_url.clone(),
            topic: c.topic(),
            is_breaking: importance == Some(Importance::Breaking),
            trend_score: trend_score(importance, tags.len(), c.discovered_at, now, c.trending_pick),
            tags,
        };
        let replaced = idx.upsert(entry.clone());
        idx.save(&index_path).await?;

        let kind = if replaced { "replay" } else { "new" };
        counter!("publish_total", "kind" => kind).increment(1);
        info!(target: "publish", id = %c.id, link = %entry.link, replaced, "article published");
        Ok(entry)
    }

    /// Regenerate `sitemap.xml` from the index. No-op without a base URL.
    pub async fn write_sitemap(&self) -> Result<Option<PathBuf>, PublishError> {
        let Some(base) = self.base_url.as_deref() else {
            return Ok(None);
        };
        let _guard = self.lock.lock().await;
        let idx = SiteIndex::load(&self.index_path()).await?;
        let xml = sitemap::render_sitemap(base, &idx.articles);
        let path = self.site_dir.join(sitemap::SITEMAP_FILE);
        write_atomic(&path, xml.as_bytes())
            .await
            .map_err(|source| PublishError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Some(path))
    }

    fn article_path(&self, slug: &str) -> PathBuf {
        self.site_dir.join(ARTICLES_DIR).join(format!("{slug}.html"))
    }

    /// Reuse the slug already indexed for this id; otherwise the first free
    /// `slug`, `slug-2`, `slug-3`, … A page that embeds this id counts as free.
    async fn resolve_slug(&self, c: &Candidate, idx: &SiteIndex) -> Result<String, PublishError> {
        if let Some(slug) = idx.get(&c.id).and_then(|e| slug_from_link(&e.link)) {
            return Ok(slug.to_string());
        }

        let mut base = slugify(&c.title);
        if base.is_empty() {
            let short: String = c.id.chars().take(12).collect();
            base = format!("article-{short}");
        }

        let mut n = 1u32;
        loop {
            let slug = if n == 1 {
                base.clone()
            } else {
                format!("{base}-{n}")
            };
            n += 1;

            let link = format!("{ARTICLES_DIR}/{slug}.html");
            if idx.articles.iter().any(|a| a.link == link && a.id != c.id) {
                continue;
            }
            let path = self.article_path(&slug);
            match tokio::fs::read_to_string(&path).await {
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(slug),
                Err(source) => return Err(PublishError::Io { path, source }),
                Ok(page) => {
                    if render::embedded_id(&page).as_deref() == Some(c.id.as_str()) {
                        return Ok(slug);
                    }
                }
            }
        }
    }
}

fn required(c: &Candidate, stage: StageName) -> Result<&Value, PublishError> {
    c.results.get(stage).ok_or_else(|| PublishError::Incomplete {
        id: c.id.clone(),
        stage,
    })
}

fn str_of<'a>(v: &'a Value, field: &str) -> Option<&'a str> {
    v.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn slug_from_link(link: &str) -> Option<&str> {
    link.trim_start_matches('/')
        .strip_prefix(ARTICLES_DIR)?
        .strip_prefix('/')?
        .strip_suffix(".html")
}
