// src/candidate.rs
//! Candidate record, its status machine and the write-once stage result map.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::text::{normalize_title, sha256_hex};

/// Pipeline stages in their fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Filter,
    Outline,
    Article,
    Tags,
}

impl StageName {
    pub const ORDER: [StageName; 4] = [
        StageName::Filter,
        StageName::Outline,
        StageName::Article,
        StageName::Tags,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Filter => "filter",
            StageName::Outline => "outline",
            StageName::Article => "article",
            StageName::Tags => "tags",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editorial importance assigned by the filter stage (or forced by a user pick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Importance {
    Breaking,
    Interesting,
    Boring,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Breaking => "Breaking",
            Importance::Interesting => "Interesting",
            Importance::Boring => "Boring",
        }
    }

    /// Case-insensitive parse; unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breaking" => Some(Importance::Breaking),
            "interesting" => Some(Importance::Interesting),
            "boring" => Some(Importance::Boring),
            _ => None,
        }
    }
}

/// Where a candidate is in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CandidateStatus {
    #[default]
    New,
    Running {
        stage: StageName,
    },
    Rejected {
        reason: String,
    },
    Failed {
        stage: StageName,
        reason: String,
    },
    Published,
    Offered,
}

impl CandidateStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CandidateStatus::Rejected { .. }
                | CandidateStatus::Failed { .. }
                | CandidateStatus::Published
                | CandidateStatus::Offered
        )
    }

    /// Short label used for metrics and the reason log.
    pub fn label(&self) -> &'static str {
        match self {
            CandidateStatus::New => "new",
            CandidateStatus::Running { .. } => "running",
            CandidateStatus::Rejected { .. } => "rejected",
            CandidateStatus::Failed { .. } => "failed",
            CandidateStatus::Published => "published",
            CandidateStatus::Offered => "offered",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResultsError {
    #[error("stage result for `{0}` is already recorded")]
    AlreadyRecorded(StageName),
}

/// Stage name → validated stage output. Entries are write-once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageResults(BTreeMap<String, Value>);

impl StageResults {
    pub fn get(&self, stage: StageName) -> Option<&Value> {
        self.0.get(stage.as_str())
    }

    pub fn contains(&self, stage: StageName) -> bool {
        self.0.contains_key(stage.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stage names that currently hold a result, in key order.
    pub fn recorded(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Store `value` under `stage`. Refuses to overwrite: a stage writes only its
    /// own entry, exactly once.
    pub fn record(&mut self, stage: StageName, value: Value) -> Result<(), ResultsError> {
        if self.contains(stage) {
            return Err(ResultsError::AlreadyRecorded(stage));
        }
        self.0.insert(stage.as_str().to_string(), value);
        Ok(())
    }

    fn str_field(&self, stage: StageName, field: &str) -> Option<&str> {
        self.get(stage)
            .and_then(|v| v.get(field))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A content item moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Identity fingerprint; see [`identity_fingerprint`]. Producers may leave it
    /// empty and the queue fills it in.
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub discovered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance_override: Option<Importance>,
    #[serde(default)]
    pub trending_pick: bool,
    #[serde(default)]
    pub results: StageResults,
    #[serde(default)]
    pub status: CandidateStatus,
}

impl Candidate {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        text: impl Into<String>,
        discovered_at: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let link = link.into();
        let text = text.into();
        let id = identity_fingerprint(None, &link, &title, &text);
        Self {
            id,
            external_id: None,
            title,
            link,
            source: String::new(),
            text,
            image_url: None,
            discovered_at,
            importance_override: None,
            trending_pick: false,
            results: StageResults::default(),
            status: CandidateStatus::New,
        }
    }

    /// Sets the external id and re-derives the identity fingerprint from it.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self.id = identity_fingerprint(
            self.external_id.as_deref(),
            &self.link,
            &self.title,
            &self.text,
        );
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_importance_override(mut self, importance: Importance) -> Self {
        self.importance_override = Some(importance);
        self
    }

    pub fn trending(mut self, on: bool) -> Self {
        self.trending_pick = on;
        self
    }

    pub fn content_fingerprint(&self) -> Option<String> {
        content_fingerprint(&self.title, self.image_url.as_deref())
    }

    /// Keyword chosen by the filter stage, else the title.
    pub fn primary_keyword(&self) -> String {
        self.results
            .str_field(StageName::Filter, "primary_keyword")
            .map(str::to_string)
            .unwrap_or_else(|| self.title.trim().to_string())
    }

    pub fn topic(&self) -> String {
        self.results
            .str_field(StageName::Filter, "topic")
            .unwrap_or("Other")
            .to_string()
    }

    /// Effective importance: a user override wins over the filter verdict.
    pub fn importance(&self) -> Option<Importance> {
        self.importance_override.or_else(|| {
            self.results
                .str_field(StageName::Filter, "importance")
                .and_then(Importance::parse)
        })
    }

    /// First paragraph-sized slice of the raw text, used by fallbacks and summaries.
    pub fn summary(&self, max_chars: usize) -> String {
        crate::text::one_line(&crate::text::normalize_text(&self.text), max_chars)
    }
}

/// SHA-256 over the most stable identity key available:
/// external id, else source link, else title + text.
pub fn identity_fingerprint(external_id: Option<&str>, link: &str, title: &str, text: &str) -> String {
    let key = match external_id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(ext) => format!("ext:{ext}"),
        None if !link.trim().is_empty() => format!("link:{}", link.trim()),
        None => format!("content:{}\n{}", title.trim(), text.trim()),
    };
    sha256_hex(&key)
}

/// Normalized title + image URL. `None` when the title is empty (nothing to compare).
pub fn content_fingerprint(title: &str, image_url: Option<&str>) -> Option<String> {
    let t = normalize_title(title);
    if t.is_empty() {
        return None;
    }
    let img = image_url.map(str::trim).unwrap_or_default();
    Some(sha256_hex(&format!("{t}\u{1f}{img}")))
}
