// src/publish/index.rs
//! Shared site index (`articles.json`) and trend scoring.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PublishError;
use crate::candidate::{content_fingerprint, Importance};
use crate::store::write_atomic;

pub const INDEX_FILE: &str = "articles.json";

/// One entry of the site index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedArticleSummary {
    pub id: String,
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub summary_short: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub is_breaking: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub trend_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteIndex {
    #[serde(default)]
    pub articles: Vec<PublishedArticleSummary>,
}

impl SiteIndex {
    /// Missing file → empty index. A file that does not parse is an error: it is
    /// never silently overwritten.
    pub async fn load(path: &Path) -> Result<Self, PublishError> {
        match tokio::fs::read_to_string(path).await {
            Ok(s) if s.trim().is_empty() => Ok(Self::default()),
            Ok(s) => serde_json::from_str(&s).map_err(|e| PublishError::Corrupt {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(PublishError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), PublishError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| PublishError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        write_atomic(path, &json)
            .await
            .map_err(|source| PublishError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn get(&self, id: &str) -> Option<&PublishedArticleSummary> {
        self.articles.iter().find(|a| a.id == id)
    }

    /// Insert or replace by id, then re-sort. Returns `true` when an entry was replaced.
    pub fn upsert(&mut self, entry: PublishedArticleSummary) -> bool {
        let replaced = match self.articles.iter_mut().find(|a| a.id == entry.id) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => {
                self.articles.push(entry);
                false
            }
        };
        self.sort();
        replaced
    }

    /// Most recent first; id breaks ties so the order is total.
    pub fn sort(&mut self) {
        self.articles.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    /// `(content_fingerprint, id)` pairs for the dedup filter.
    pub fn content_history(&self) -> Vec<(String, String)> {
        self.articles
            .iter()
            .filter_map(|a| {
                content_fingerprint(&a.title, a.image_url.as_deref()).map(|fp| (fp, a.id.clone()))
            })
            .collect()
    }
}

/// +10 breaking / +5 interesting, +0.5 per tag, up to +5 for recency (linear
/// decay over 7 days), +5 for a trending pick.
pub fn trend_score(
    importance: Option<Importance>,
    tag_count: usize,
    discovered_at: DateTime<Utc>,
    now: DateTime<Utc>,
    trending_pick: bool,
) -> f64 {
    let mut score = match importance {
        Some(Importance::Breaking) => 10.0,
        Some(Importance::Interesting) => 5.0,
        _ => 0.0,
    };
    score += 0.5 * tag_count as f64;

    let age_days = (now - discovered_at).num_seconds().max(0) as f64 / 86_400.0;
    score += (5.0 * (1.0 - age_days / 7.0)).clamp(0.0, 5.0);

    if trending_pick {
        score += 5.0;
    }
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(id: &str, minutes_ago: i64) -> PublishedArticleSummary {
        PublishedArticleSummary {
            id: id.into(),
            title: format!("t-{id}"),
            link: format!("articles/{id}.html"),
            published_at: Utc::now() - Duration::minutes(minutes_ago),
            summary_short: String::new(),
            image_url: None,
            topic: "Other".into(),
            is_breaking: false,
            tags: vec![],
            trend_score: 0.0,
        }
    }

    #[test]
    fn upsert_replaces_by_id_and_keeps_recency_order() {
        let mut idx = SiteIndex::default();
        idx.upsert(entry("old", 60));
        idx.upsert(entry("new", 1));
        assert!(idx.upsert(entry("old", 0)));
        assert_eq!(idx.articles.len(), 2);
        assert_eq!(idx.articles[0].id, "old");
    }

    #[test]
    fn trend_score_components() {
        let now = Utc::now();
        assert_eq!(trend_score(Some(Importance::Breaking), 4, now, now, false), 17.0);
        assert_eq!(
            trend_score(Some(Importance::Interesting), 0, now - Duration::days(10), now, true),
            10.0
        );
        let half = trend_score(None, 0, now - Duration::hours(84), now, false);
        assert!((half - 2.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn corrupt_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join(INDEX_FILE);
        std::fs::write(&p, "{not json").unwrap();
        assert!(matches!(
            SiteIndex::load(&p).await,
            Err(PublishError::Corrupt { .. })
        ));
        assert!(SiteIndex::load(&dir.path().join("missing.json"))
            .await
            .unwrap()
            .articles
            .is_empty());
    }
}
