// src/stages/mod.rs
//! The fixed stage sequence: filter → outline → article → tags.
//!
//! A stage only describes itself: its schema, how to ask the model, what to use
//! when the model cannot be reached, and how to judge the validated result. The
//! driver owns calling, retrying, repairing and state transitions.

pub mod article;
pub mod filter;
pub mod outline;
pub mod tags;

use serde_json::Value;

use crate::ai::CompletionRequest;
use crate::candidate::{Candidate, StageName};
use crate::schema::Schema;

/// Business judgement on a validated stage result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Reject(String),
}

pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    fn schema(&self) -> &'static Schema;

    fn build_request(&self, c: &Candidate) -> CompletionRequest;

    /// Output used when retries are exhausted. `None` means the stage fails.
    fn fallback(&self, _c: &Candidate) -> Option<Value> {
        None
    }

    /// Whether a fully synthesized result (repair `TotalFailure`) is acceptable.
    fn tolerates_synthesized(&self) -> bool {
        true
    }

    fn evaluate(&self, _c: &Candidate, _result: &Value) -> Verdict {
        Verdict::Continue
    }
}

/// Stages in execution order.
pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(filter::FilterStage),
        Box::new(outline::OutlineStage),
        Box::new(article::ArticleStage),
        Box::new(tags::TagsStage),
    ]
}

/// Common prompt header. The first line is always `Title: ...`.
pub(crate) fn candidate_brief(c: &Candidate, text_chars: usize) -> String {
    let mut out = format!("Title: {}\nSource: {}\n", c.title.trim(), c.link.trim());
    if !c.source.trim().is_empty() {
        out.push_str(&format!("Publisher: {}\n", c.source.trim()));
    }
    let text = c.summary(text_chars);
    if !text.is_empty() {
        out.push_str(&format!("Text: {text}\n"));
    }
    out
}
