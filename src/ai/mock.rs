// src/ai/mock.rs
//! Deterministic provider for offline runs (`AI_TEST_MODE=mock`) and tests.
//!
//! Scripted responses queued with [`MockProvider::push`] are served first, per
//! stage, in FIFO order. After that a fixed response (if set) or a canned,
//! schema-valid answer derived from the request is returned.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::json;

use super::{CompletionClient, CompletionRequest};
use crate::candidate::StageName;
use crate::retry::CallError;

#[derive(Default)]
struct MockState {
    scripted: HashMap<StageName, VecDeque<Result<String, CallError>>>,
    fixed: HashMap<StageName, String>,
    calls: HashMap<StageName, u32>,
}

/// Cloning shares the script and the call counters.
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response for `stage`.
    pub fn push(&self, stage: StageName, response: Result<String, CallError>) -> &Self {
        self.lock()
            .scripted
            .entry(stage)
            .or_default()
            .push_back(response);
        self
    }

    /// Answer every unscripted `stage` call with `text`.
    pub fn respond_with(&self, stage: StageName, text: impl Into<String>) -> &Self {
        self.lock().fixed.insert(stage, text.into());
        self
    }

    pub fn calls(&self, stage: StageName) -> u32 {
        self.lock().calls.get(&stage).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.lock().calls.values().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CompletionClient for MockProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, CallError> {
        let mut st = self.lock();
        *st.calls.entry(req.stage).or_insert(0) += 1;
        if let Some(next) = st.scripted.get_mut(&req.stage).and_then(VecDeque::pop_front) {
            return next;
        }
        if let Some(fixed) = st.fixed.get(&req.stage) {
            return Ok(fixed.clone());
        }
        Ok(canned(req))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Title line every stage prompt starts with.
fn title_of(req: &CompletionRequest) -> String {
    req.user
        .lines()
        .find_map(|l| l.strip_prefix("Title:"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string())
}

fn canned(req: &CompletionRequest) -> String {
    let title = title_of(req);
    let v = match req.stage {
        StageName::Filter => json!({
            "importance": "Interesting",
            "topic": "Software",
            "primary_keyword": title,
            "reasoning": "Mock verdict."
        }),
        StageName::Outline => json!({
            "h1": title,
            "sections": [
                {"kind": "introduction", "heading": format!("What happened: {title}"), "purpose": "Set the scene."},
                {"kind": "body", "heading": "The details", "purpose": "Explain the facts."},
                {"kind": "body", "heading": "Why it matters", "purpose": "Explain the impact."},
                {"kind": "body", "heading": "What experts say", "purpose": "Add context."},
                {"kind": "conclusion", "heading": "What comes next", "purpose": "Wrap up."}
            ]
        }),
        StageName::Article => json!({
            "title_tag": title,
            "meta_description": format!("{title}: the key facts."),
            "body_md": format!("## What happened\n\n{title}.\n\n## What comes next\n\nMore soon.")
        }),
        StageName::Tags => json!({ "tags": ["AI News", "Technology"] }),
    };
    v.to_string()
}
